//! Callbacks and the machinery they plug into.
//!
//! `core` holds the registry, descriptors and context. `builtins` and
//! `commands` are the two plugins every bot loads.

pub mod builtins;
pub mod commands;
pub mod core;

pub use builtins::CorePlugin;
pub use commands::{CommandRouter, Invocation};
pub use self::core::{
    ALL, Callback, Classification, Context, DIE, Descriptor, HandlerError, HandlerResult, Registry,
};
