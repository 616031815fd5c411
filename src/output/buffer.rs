//! Scoped output buffers.

use super::printer::{Method, Printer};

/// Accumulates lines for one recipient and sends them as a single message
/// when dropped.
///
/// The flush happens on every scope exit: normal return, `?` early return,
/// or unwinding from a panic. Nothing is sent if no line was added.
pub struct OutputBuffer {
    printer: Printer,
    recipient: String,
    method: Method,
    lines: Vec<String>,
}

impl OutputBuffer {
    pub(super) fn new(printer: Printer, recipient: String, method: Method) -> Self {
        Self {
            printer,
            recipient,
            method,
            lines: Vec::new(),
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn method(&self) -> Method {
        self.method
    }
}

impl<S: Into<String>> Extend<S> for OutputBuffer {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.lines.extend(iter.into_iter().map(Into::into));
    }
}

impl Drop for OutputBuffer {
    fn drop(&mut self) {
        if self.lines.is_empty() {
            return;
        }
        let text = self.lines.join("\n");
        self.printer.message(&text, &self.recipient, self.method);
    }
}

impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("recipient", &self.recipient)
            .field("method", &self.method)
            .field("lines", &self.lines.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::printer::tests::{RecordingSink, unpaced};
    use super::*;
    use crate::error::HandlerError;
    use std::time::Duration;

    fn printer() -> (Printer, RecordingSink) {
        let sink = RecordingSink::default();
        let printer = Printer::spawn(sink.clone(), &unpaced()).unwrap();
        (printer, sink)
    }

    #[test]
    fn test_buffer_flushes_once_on_scope_exit() {
        let (printer, sink) = printer();
        {
            let mut buf = printer.buffer("#c", Method::Privmsg);
            buf.push("one");
            buf.extend(["two", "three"]);
            assert_eq!(buf.len(), 3);
            assert!(sink.0.lock().is_empty());
        }
        assert!(printer.shutdown(Duration::from_secs(5)));
        assert_eq!(
            *sink.0.lock(),
            vec!["PRIVMSG #c :one", "PRIVMSG #c :two", "PRIVMSG #c :three"]
        );
    }

    #[test]
    fn test_buffer_flushes_when_handler_errors() {
        let (printer, sink) = printer();

        fn failing(printer: &Printer) -> Result<(), HandlerError> {
            let mut buf = printer.buffer("nick", Method::Notice);
            buf.push("partial 1");
            buf.push("partial 2");
            Err(HandlerError::Internal("lookup failed".into()))
        }

        assert!(failing(&printer).is_err());
        assert!(printer.shutdown(Duration::from_secs(5)));
        assert_eq!(*sink.0.lock(), vec!["NOTICE nick :partial 1", "NOTICE nick :partial 2"]);
    }

    #[test]
    fn test_buffer_flushes_when_handler_panics() {
        let (printer, sink) = printer();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut buf = printer.buffer("#c", Method::Privmsg);
            buf.push("before panic");
            panic!("handler blew up");
        }));

        assert!(result.is_err());
        assert!(printer.shutdown(Duration::from_secs(5)));
        assert_eq!(*sink.0.lock(), vec!["PRIVMSG #c :before panic"]);
    }

    #[test]
    fn test_empty_buffer_sends_nothing() {
        let (printer, sink) = printer();
        drop(printer.buffer("#c", Method::Privmsg));
        assert!(printer.shutdown(Duration::from_secs(5)));
        assert!(sink.0.lock().is_empty());
    }
}
