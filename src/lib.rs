//! relaybot - IRC bot dispatch and concurrency core.
//!
//! Raw protocol lines go into a [`Dispatcher`](dispatch::Dispatcher), which
//! routes each one to the callbacks registered for its trigger. Every
//! callback declares how it may run: inline on the reading thread, on the
//! shared general or background worker, or on an elastic pool of workers.
//! All output leaves through one paced [`Printer`](output::Printer) per
//! connection.

pub mod bot;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod line;
pub mod metrics;
pub mod network;
pub mod output;
pub mod plugin;
pub mod telemetry;
pub mod work;

pub use bot::Bot;
pub use dispatch::Dispatcher;
