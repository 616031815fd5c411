//! Output sinks and a dispatcher harness.

#![allow(dead_code)]

use parking_lot::Mutex;
use relaybot::Dispatcher;
use relaybot::config::Config;
use relaybot::error::OutputError;
use relaybot::handlers::{Context, Registry};
use relaybot::output::{LineSink, Printer};
use std::io;
use std::sync::Arc;

/// Records every line the printer writes.
#[derive(Clone, Default)]
pub struct RecordingSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl LineSink for RecordingSink {
    fn send_line(&mut self, line: &str) -> Result<(), OutputError> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}

/// A socket that is always broken.
pub struct FailingSink;

impl LineSink for FailingSink {
    fn send_line(&mut self, _line: &str) -> Result<(), OutputError> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away").into())
    }
}

/// Defaults with output pacing off and a generous shutdown grace.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.output.lines_per_second = 0;
    config.dispatch.shutdown_grace_ms = 5_000;
    config
}

/// A dispatcher whose printer writes to `sink`.
pub fn dispatcher_writing_to(sink: impl LineSink, config: Config) -> Dispatcher {
    let printer = Printer::spawn(sink, &config.output).expect("spawn printer");
    let config = Arc::new(config);
    let ctx = Context::new(Arc::new(Registry::new()), printer, Arc::clone(&config));
    Dispatcher::new(ctx, &config.dispatch).expect("spawn dispatcher")
}

/// A dispatcher writing to a [`RecordingSink`].
pub struct Harness {
    pub dispatcher: Dispatcher,
    pub sink: RecordingSink,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let sink = RecordingSink::default();
        let dispatcher = dispatcher_writing_to(sink.clone(), config);
        Self { dispatcher, sink }
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(self.dispatcher.registry())
    }

    pub fn dispatch(&mut self, line: &str) -> usize {
        self.dispatcher.dispatch(line)
    }

    /// Shut everything down and return what was written.
    pub fn finish(mut self) -> Vec<String> {
        assert!(self.dispatcher.shutdown(), "workers did not stop in time");
        self.sink.lines()
    }
}
