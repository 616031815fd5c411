//! Telemetry utilities for handler timing and tracing spans.

use std::time::Instant;

/// Guard for timing a handler invocation.
///
/// Records handler latency when dropped, so early returns and unwinding are
/// measured too.
pub struct HandlerTimer<'a> {
    handler: &'a str,
    start: Instant,
}

impl<'a> HandlerTimer<'a> {
    pub fn new(handler: &'a str) -> Self {
        Self {
            handler,
            start: Instant::now(),
        }
    }
}

impl Drop for HandlerTimer<'_> {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_handler(self.handler, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, debug_span, info_span};

    /// Span for one dispatched protocol line.
    pub fn dispatch(trigger: &str, handlers: usize) -> Span {
        debug_span!("dispatch", trigger = %trigger, handlers)
    }

    /// Span for one handler call.
    pub fn handler(name: &str, classification: &str) -> Span {
        debug_span!("handler", name = %name, class = %classification)
    }

    /// Span for a server session.
    pub fn session(address: &str, nick: &str) -> Span {
        info_span!("session", address = %address, nick = %nick)
    }
}
