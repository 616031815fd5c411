//! Network module.
//!
//! Contains the blocking server [`Connection`] and its write half.

mod connection;

pub use connection::{Connection, SocketWriter};
