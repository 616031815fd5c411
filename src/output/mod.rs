//! Serialized outbound path.
//!
//! Every line written to the server goes through one [`Printer`] worker per
//! connection, which keeps output in FIFO order and paces it.

mod buffer;
pub(crate) mod printer;

pub use buffer::OutputBuffer;
pub use printer::{LineSink, Method, Printer, format_lines};
