//! Synchronous executor.

use super::Executor;
use crate::work::worker::run_isolated;
use crate::work::{CancelToken, Job, Processor};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Runs jobs on the caller's thread with the same failure isolation as a
/// worker. There is no queue, so a declined job is dropped.
pub struct InlineExecutor<J: Job> {
    processor: Arc<dyn Processor<J>>,
    cancel: CancelToken,
}

impl<J: Job> InlineExecutor<J> {
    pub fn new(processor: Arc<dyn Processor<J>>) -> Self {
        Self {
            processor,
            cancel: CancelToken::new(),
        }
    }
}

impl<J: Job> Executor<J> for InlineExecutor<J> {
    fn call(&self, job: J) {
        if let Some(job) = run_isolated("inline", job, self.processor.as_ref(), &self.cancel) {
            warn!(job = %job.describe(), "Inline job not accepted, dropping");
        }
    }

    fn shutdown(&mut self, _grace: Duration) -> bool {
        true
    }
}
