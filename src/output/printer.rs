//! Printer worker owning the socket write path.

use super::buffer::OutputBuffer;
use crate::config::OutputConfig;
use crate::error::{JobError, OutputError};
use crate::metrics;
use crate::work::{CancelToken, Job, Processor, WorkQueue, Worker};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Destination for formatted protocol lines.
///
/// Implementations append the line terminator themselves.
pub trait LineSink: Send + 'static {
    fn send_line(&mut self, line: &str) -> Result<(), OutputError>;
}

/// How a message is delivered to its recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Privmsg,
    Notice,
    /// CTCP ACTION (`/me`), carried in a PRIVMSG.
    Action,
}

impl Method {
    pub fn command(self) -> &'static str {
        match self {
            Self::Privmsg | Self::Action => "PRIVMSG",
            Self::Notice => "NOTICE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action => f.write_str("ACTION"),
            other => f.write_str(other.command()),
        }
    }
}

/// Bytes the CTCP ACTION wrapper adds: `\x01ACTION ` and the closing `\x01`.
const ACTION_WRAPPER: usize = 9;

/// Format `text` as protocol lines, one per non-empty text line, splitting
/// anything longer than `max_line_bytes` on character boundaries.
pub fn format_lines(text: &str, recipient: &str, method: Method, max_line_bytes: usize) -> Vec<String> {
    let command = method.command();
    let mut overhead = command.len() + 1 + recipient.len() + 2;
    if method == Method::Action {
        overhead += ACTION_WRAPPER;
    }
    let room = max_line_bytes.saturating_sub(overhead).max(1);

    let mut out = Vec::new();
    for line in text.lines().filter(|l| !l.is_empty()) {
        for chunk in split_on_char_boundaries(line, room) {
            let formatted = match method {
                Method::Action => format!("{command} {recipient} :\x01ACTION {chunk}\x01"),
                _ => format!("{command} {recipient} :{chunk}"),
            };
            out.push(formatted);
        }
    }
    out
}

fn split_on_char_boundaries(mut rest: &str, max: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    while rest.len() > max {
        let mut cut = max;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            // A single character wider than the room left; send it whole.
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        chunks.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    chunks.push(rest);
    chunks
}

/// One protocol line waiting to be written.
pub struct Outbound {
    line: String,
}

impl Job for Outbound {
    fn is_threadsafe(&self) -> bool {
        false
    }

    fn label(&self) -> &str {
        "printer"
    }

    fn describe(&self) -> String {
        format!("send({:?})", self.line)
    }
}

struct SinkProcessor {
    sink: Mutex<Box<dyn LineSink>>,
    limiter: Option<DefaultDirectRateLimiter>,
    clock: DefaultClock,
}

impl SinkProcessor {
    /// Block until the token bucket allows another line.
    fn pace(&self) {
        if let Some(limiter) = &self.limiter {
            while let Err(not_until) = limiter.check() {
                thread::sleep(not_until.wait_time_from(self.clock.now()));
            }
        }
    }
}

impl Processor<Outbound> for SinkProcessor {
    fn process(&self, job: &Outbound, _cancel: &CancelToken) -> Result<(), JobError> {
        if job.line.contains(['\r', '\n']) {
            return Err(OutputError::EmbeddedNewline.into());
        }
        self.pace();
        self.sink.lock().send_line(&job.line)?;
        metrics::record_line_sent();
        Ok(())
    }
}

/// Handle to the serialized output worker of one connection.
///
/// Cloning is cheap; every clone feeds the same queue.
#[derive(Clone)]
pub struct Printer {
    worker: Arc<Worker<Outbound>>,
    max_line_bytes: usize,
}

impl Printer {
    /// Spawn the printer thread writing to `sink`.
    pub fn spawn(sink: impl LineSink, config: &OutputConfig) -> io::Result<Self> {
        let limiter = NonZeroU32::new(config.lines_per_second).map(|rate| {
            let burst = NonZeroU32::new(config.burst).unwrap_or(nonzero!(1u32));
            RateLimiter::direct(Quota::per_second(rate).allow_burst(burst))
        });
        let processor: Arc<dyn Processor<Outbound>> = Arc::new(SinkProcessor {
            sink: Mutex::new(Box::new(sink)),
            limiter,
            clock: DefaultClock::default(),
        });
        let worker = Worker::spawn("printer", processor, WorkQueue::new())?;
        Ok(Self {
            worker,
            max_line_bytes: config.max_line_bytes,
        })
    }

    /// Queue `text` for `recipient`, one protocol line per text line.
    ///
    /// Returns immediately with the number of lines queued. The lines of one
    /// call are queued contiguously.
    pub fn message(&self, text: &str, recipient: &str, method: Method) -> usize {
        let lines = format_lines(text, recipient, method, self.max_line_bytes);
        let count = lines.len();
        if count == 0 {
            return 0;
        }
        let jobs = lines.into_iter().map(|line| Outbound { line }).collect();
        if let Err(dropped) = self.worker.put_all(jobs) {
            warn!(recipient = %recipient, dropped = dropped.len(), "Printer stopped, dropping output");
            return 0;
        }
        count
    }

    /// Queue a preformatted protocol line such as `PONG` or `JOIN`.
    pub fn send_raw(&self, line: impl Into<String>) -> bool {
        match self.worker.put(Outbound { line: line.into() }) {
            Ok(()) => true,
            Err(job) => {
                warn!(line = %job.line, "Printer stopped, dropping raw line");
                false
            }
        }
    }

    /// Open a scoped buffer flushed as one message when dropped.
    pub fn buffer(&self, recipient: impl Into<String>, method: Method) -> OutputBuffer {
        OutputBuffer::new(self.clone(), recipient.into(), method)
    }

    /// Lines queued but not yet written.
    pub fn pending(&self) -> usize {
        self.worker.queue_len()
    }

    /// Write what is queued, then stop. Returns `false` if the printer thread
    /// did not finish within `grace`.
    pub fn shutdown(&self, grace: Duration) -> bool {
        self.worker.terminate();
        self.worker.join_timeout(grace)
    }
}

impl fmt::Debug for Printer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Printer")
            .field("worker", &self.worker.name())
            .field("pending", &self.pending())
            .finish()
    }
}
