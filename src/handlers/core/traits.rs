//! Callback trait, classification and handler descriptors.
//!
//! A handler's classification is chosen when its [`Descriptor`] is built and
//! never changes afterwards. The dispatcher routes on it:
//!
//! - [`Classification::General`]: the shared general worker, serialized
//! - [`Classification::Inline`]: synchronously on the dispatch thread
//! - [`Classification::Threadsafe`]: the elastic worker pool, concurrent
//! - [`Classification::Background`]: the background worker, serialized

use super::context::{Context, HandlerResult};
use std::fmt;
use std::sync::Arc;

/// Concurrency contract a handler declares at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Classification {
    #[default]
    General,
    Inline,
    Threadsafe,
    Background,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Classification::General,
        Classification::Inline,
        Classification::Threadsafe,
        Classification::Background,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Inline => "inline",
            Self::Threadsafe => "threadsafe",
            Self::Background => "background",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handler invoked with the raw protocol line.
pub trait Callback: Send + Sync + 'static {
    fn call(&self, ctx: &Context, line: &str) -> HandlerResult;
}

impl<F> Callback for F
where
    F: Fn(&Context, &str) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, ctx: &Context, line: &str) -> HandlerResult {
        self(ctx, line)
    }
}

/// One registered callback.
#[derive(Clone)]
pub struct Descriptor {
    name: String,
    /// Normalized trigger key, set when the registry stores the descriptor.
    trigger: Option<String>,
    classification: Classification,
    callback: Arc<dyn Callback>,
}

impl Descriptor {
    pub fn new<F>(name: impl Into<String>, classification: Classification, f: F) -> Self
    where
        F: Fn(&Context, &str) -> HandlerResult + Send + Sync + 'static,
    {
        Self::with_callback(name, classification, Arc::new(f))
    }

    /// Build from a shared callback, keeping its identity for
    /// [`Registry::unregister_by_identity`](super::Registry::unregister_by_identity).
    pub fn with_callback(
        name: impl Into<String>,
        classification: Classification,
        callback: Arc<dyn Callback>,
    ) -> Self {
        Self {
            name: name.into(),
            trigger: None,
            classification,
            callback,
        }
    }

    pub fn general<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context, &str) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new(name, Classification::General, f)
    }

    pub fn inline<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context, &str) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new(name, Classification::Inline, f)
    }

    pub fn threadsafe<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context, &str) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new(name, Classification::Threadsafe, f)
    }

    pub fn background<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context, &str) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new(name, Classification::Background, f)
    }

    /// Qualify the name with the module that owns the handler.
    pub fn in_module(mut self, module: &str) -> Self {
        self.name = format!("{module}::{}", self.name);
        self
    }

    /// Qualified name, `module::function` once placed in a module.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key this descriptor was registered under, `None` before
    /// registration.
    pub fn trigger(&self) -> Option<&str> {
        self.trigger.as_deref()
    }

    pub(super) fn bind_trigger(mut self, key: String) -> Self {
        self.trigger = Some(key);
        self
    }

    pub fn module(&self) -> Option<&str> {
        self.name.rsplit_once("::").map(|(module, _)| module)
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn callback(&self) -> &Arc<dyn Callback> {
        &self.callback
    }

    /// Whether this descriptor wraps exactly `handler`.
    pub fn is_handler(&self, handler: &Arc<dyn Callback>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.callback), Arc::as_ptr(handler))
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("classification", &self.classification)
            .finish()
    }
}
