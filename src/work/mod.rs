//! Work queues and the worker threads that drain them.

pub mod queue;
pub mod worker;

pub use queue::WorkQueue;
pub use worker::{CancelToken, Job, Processor, Worker, WorkerState};
