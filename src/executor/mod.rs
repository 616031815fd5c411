//! Executors: where a job runs.
//!
//! The dispatcher owns one executor per classification:
//!
//! - [`InlineExecutor`]: on the calling thread
//! - [`SingleWorkerExecutor`]: one worker thread, used twice (general and
//!   background)
//! - [`PoolExecutor`]: an elastic set of workers fed shortest-queue first

pub mod call;
pub mod inline;
pub mod pool;
pub mod single;

pub use call::{Call, CallProcessor};
pub use inline::InlineExecutor;
pub use pool::{PoolExecutor, PoolSettings, RebalanceReport};
pub use single::SingleWorkerExecutor;

use crate::work::Job;
use std::time::Duration;

/// Common executor contract.
pub trait Executor<J: Job> {
    /// Submit a job. Never blocks on the job itself, except inline.
    fn call(&self, job: J);

    /// Stop after queued work, waiting up to `grace` for threads to exit.
    /// Returns `false` if some thread had to be detached.
    fn shutdown(&mut self, grace: Duration) -> bool;
}
