//! Core handler infrastructure.
//!
//! This module contains the fundamental types of the callback system: the
//! [`Callback`] trait and its [`Classification`], the [`Descriptor`] stored
//! per registration, the [`Registry`] keyed by trigger, and the [`Context`]
//! handed to every call.

pub mod context;
pub mod registry;
pub mod traits;

pub use context::{Context, HandlerError, HandlerResult};
pub use registry::{ALL, DIE, Registry, normalize_trigger};
pub use traits::{Callback, Classification, Descriptor};
