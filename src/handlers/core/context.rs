//! Handler context.
//!
//! A [`Context`] is the only handle a callback gets on the rest of the bot:
//! the registry (plugins and INLINE handlers may re-register), the output
//! printer, the loaded configuration, and the cancellation token of the
//! worker running the call.

use super::registry::Registry;
use crate::config::Config;
use crate::output::{Method, OutputBuffer, Printer};
use crate::work::CancelToken;
use parking_lot::RwLock;
use std::sync::Arc;

pub use crate::error::{HandlerError, HandlerResult};

/// Handler context passed to each callback.
///
/// Cheap to clone; every clone shares the same registry, printer and nick.
#[derive(Clone)]
pub struct Context {
    registry: Arc<Registry>,
    printer: Printer,
    config: Arc<Config>,
    nick: Arc<RwLock<String>>,
    cancel: CancelToken,
}

impl Context {
    pub fn new(registry: Arc<Registry>, printer: Printer, config: Arc<Config>) -> Self {
        let nick = Arc::new(RwLock::new(config.server.nick.clone()));
        Self {
            registry,
            printer,
            config,
            nick,
            cancel: CancelToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn printer(&self) -> &Printer {
        &self.printer
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The nick the bot currently holds on the server.
    pub fn nick(&self) -> String {
        self.nick.read().clone()
    }

    pub fn set_nick(&self, nick: impl Into<String>) {
        *self.nick.write() = nick.into();
    }

    /// Whether the worker running this call has been retired. Long-running
    /// handlers should poll this and return early.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Same context, observing `cancel`.
    pub(crate) fn with_cancel(&self, cancel: &CancelToken) -> Self {
        Self {
            cancel: cancel.clone(),
            ..self.clone()
        }
    }

    /// Queue `text` for `recipient`. See [`Printer::message`].
    pub fn message(&self, text: &str, recipient: &str, method: Method) -> usize {
        self.printer.message(text, recipient, method)
    }

    /// Open a scoped buffer for `recipient`.
    pub fn buffer(&self, recipient: impl Into<String>, method: Method) -> OutputBuffer {
        self.printer.buffer(recipient, method)
    }

    /// Drain `lines` into one buffered message. Returns how many lines were
    /// collected.
    pub fn reply_lines<I, S>(&self, recipient: &str, method: Method, lines: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut buf = self.buffer(recipient, method);
        buf.extend(lines);
        buf.len()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("nick", &*self.nick.read())
            .field("registry", &self.registry)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
