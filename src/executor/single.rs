//! Single-worker executor.

use super::Executor;
use crate::work::{Job, Processor, WorkQueue, Worker};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// One worker thread; every job submitted here runs serialized, in
/// submission order, off the caller's thread.
///
/// The dispatcher keeps two of these: `general` and `background`.
pub struct SingleWorkerExecutor<J: Job> {
    worker: Arc<Worker<J>>,
}

impl<J: Job> SingleWorkerExecutor<J> {
    pub fn spawn(role: &str, processor: Arc<dyn Processor<J>>) -> io::Result<Self> {
        let worker = Worker::spawn(role, processor, WorkQueue::new())?;
        Ok(Self { worker })
    }

    pub fn worker(&self) -> &Arc<Worker<J>> {
        &self.worker
    }

    pub fn queue_len(&self) -> usize {
        self.worker.queue_len()
    }

    /// Discard queued jobs and keep running. See [`Worker::clear`].
    pub fn clear(&self) -> usize {
        self.worker.clear()
    }
}

impl<J: Job> Executor<J> for SingleWorkerExecutor<J> {
    fn call(&self, job: J) {
        if let Err(job) = self.worker.put(job) {
            warn!(worker = %self.worker.name(), job = %job.describe(), "Worker stopped, dropping job");
        }
    }

    fn shutdown(&mut self, grace: Duration) -> bool {
        self.worker.terminate();
        self.worker.join_timeout(grace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::worker::tests::{TestJob, Recorder};

    #[test]
    fn test_jobs_run_serialized_in_order() {
        let recorder = Arc::new(Recorder::default());
        let mut executor =
            SingleWorkerExecutor::spawn("general", recorder.clone() as Arc<dyn Processor<TestJob>>).unwrap();

        for id in 0..20 {
            executor.call(TestJob::record(id));
        }
        assert!(executor.shutdown(Duration::from_secs(5)));
        assert_eq!(*recorder.seen.lock(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_call_after_shutdown_is_dropped() {
        let recorder = Arc::new(Recorder::default());
        let mut executor =
            SingleWorkerExecutor::spawn("background", recorder.clone() as Arc<dyn Processor<TestJob>>).unwrap();

        assert!(executor.shutdown(Duration::from_secs(5)));
        executor.call(TestJob::record(1));
        assert!(recorder.seen.lock().is_empty());
    }
}
