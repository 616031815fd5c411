//! Queue-draining worker threads.
//!
//! A [`Worker`] owns one OS thread and one [`WorkQueue`]. It pulls jobs one
//! at a time and hands them to a [`Processor`]. Failures and panics are
//! logged and the loop keeps going; a job the processor declines is put back
//! at the tail of the same queue, ahead of any pending sentinel.

use super::queue::WorkQueue;
use crate::error::JobError;
use crate::metrics;
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// A unit of work a worker can run.
pub trait Job: Send + 'static {
    /// Whether this job may run concurrently with other invocations of the
    /// same handler. Decides which side of a [`Worker::dump`] it lands on.
    fn is_threadsafe(&self) -> bool;

    /// Short stable label, used for metrics.
    fn label(&self) -> &str;

    /// Enough detail to reconstruct the failed call in a log line.
    fn describe(&self) -> String;
}

/// Execution logic plugged into a worker.
pub trait Processor<J>: Send + Sync + 'static {
    fn process(&self, job: &J, cancel: &CancelToken) -> Result<(), JobError>;
}

/// Cooperative cancellation flag shared between a worker and the jobs it runs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Lifecycle of a worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    /// Queued jobs are being discarded; the worker restarts on a fresh queue.
    Draining,
    Stopped,
}

/// Run one job with failure isolation.
///
/// Returns the job back when the processor declined it.
pub(crate) fn run_isolated<J: Job>(
    runner: &str,
    job: J,
    processor: &dyn Processor<J>,
    cancel: &CancelToken,
) -> Option<J> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| processor.process(&job, cancel)));
    match result {
        Ok(Ok(())) => None,
        Ok(Err(JobError::NotAccepted)) => {
            debug!(worker = %runner, job = %job.describe(), "Job not accepted");
            metrics::record_job_retry(job.label());
            Some(job)
        }
        Ok(Err(err)) => {
            error!(
                worker = %runner,
                job = %job.describe(),
                code = err.error_code(),
                error = %err,
                "Job failed"
            );
            metrics::record_job_failure(job.label(), err.error_code());
            None
        }
        Err(payload) => {
            error!(
                worker = %runner,
                job = %job.describe(),
                panic = %panic_message(payload.as_ref()),
                "Job panicked"
            );
            metrics::record_job_failure(job.label(), "panic");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A thread draining one work queue.
pub struct Worker<J: Job> {
    id: u64,
    name: String,
    queue: Mutex<Arc<WorkQueue<J>>>,
    state: Mutex<WorkerState>,
    busy_since: Mutex<Option<Instant>>,
    idle_since: Mutex<Instant>,
    cancel: CancelToken,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<J: Job> Worker<J> {
    /// Spawn a worker thread consuming `queue`.
    ///
    /// `role` ends up in the thread name (`relaybot-<role>-<id>`).
    pub fn spawn(
        role: &str,
        processor: Arc<dyn Processor<J>>,
        queue: WorkQueue<J>,
    ) -> io::Result<Arc<Self>> {
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
        let worker = Arc::new(Self {
            id,
            name: format!("relaybot-{role}-{id}"),
            queue: Mutex::new(Arc::new(queue)),
            state: Mutex::new(WorkerState::Running),
            busy_since: Mutex::new(None),
            idle_since: Mutex::new(Instant::now()),
            cancel: CancelToken::new(),
            thread: Mutex::new(None),
        });

        let handle = thread::Builder::new().name(worker.name.clone()).spawn({
            let worker = Arc::clone(&worker);
            move || worker.run(processor)
        })?;
        *worker.thread.lock() = Some(handle);
        Ok(worker)
    }

    fn run(self: Arc<Self>, processor: Arc<dyn Processor<J>>) {
        debug!(worker = %self.name, "Worker started");
        loop {
            let queue = self.current_queue();
            while let Some(job) = queue.get() {
                if *self.state.lock() == WorkerState::Draining {
                    break;
                }
                self.mark_busy();
                let declined = run_isolated(&self.name, job, processor.as_ref(), &self.cancel);
                self.mark_idle();
                if let Some(job) = declined {
                    queue.requeue(job);
                    thread::yield_now();
                }
            }

            let mut state = self.state.lock();
            if *state == WorkerState::Draining {
                let discarded = queue.flush().len();
                *state = WorkerState::Running;
                debug!(worker = %self.name, discarded, "Worker drained, continuing on fresh queue");
                continue;
            }
            *state = WorkerState::Stopped;
            break;
        }
        debug!(worker = %self.name, "Worker stopped");
    }

    fn current_queue(&self) -> Arc<WorkQueue<J>> {
        Arc::clone(&self.queue.lock())
    }

    fn mark_busy(&self) {
        *self.busy_since.lock() = Some(Instant::now());
    }

    fn mark_idle(&self) {
        *self.busy_since.lock() = None;
        *self.idle_since.lock() = Instant::now();
    }

    /// Enqueue a job. Hands the job back if the worker has been retired.
    pub fn put(&self, job: J) -> Result<(), J> {
        let mut job = job;
        loop {
            let queue = self.current_queue();
            match queue.put(job) {
                Ok(()) => return Ok(()),
                Err(refused) if self.swapped_since(&queue) => job = refused,
                Err(refused) => return Err(refused),
            }
        }
    }

    /// Enqueue several jobs contiguously.
    pub fn put_all(&self, jobs: Vec<J>) -> Result<(), Vec<J>> {
        let mut jobs = jobs;
        loop {
            let queue = self.current_queue();
            match queue.put_all(jobs) {
                Ok(()) => return Ok(()),
                Err(refused) if self.swapped_since(&queue) => jobs = refused,
                Err(refused) => return Err(refused),
            }
        }
    }

    /// A refusal from a queue that `clear` has since replaced is retried on
    /// the fresh one.
    fn swapped_since(&self, queue: &Arc<WorkQueue<J>>) -> bool {
        !Arc::ptr_eq(queue, &self.queue.lock())
    }

    /// Discard everything queued and keep serving new work on a fresh queue.
    ///
    /// The job in progress, if any, runs to completion. Returns the number of
    /// discarded jobs.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        if *state == WorkerState::Stopped {
            return 0;
        }
        let current = self.current_queue();
        if current.is_closed() {
            // Already told to stop: discard the backlog but keep the sentinel.
            return current.flush().len();
        }
        *state = WorkerState::Draining;
        let old = std::mem::replace(&mut *self.queue.lock(), Arc::new(WorkQueue::new()));
        drop(state);

        let discarded = old.flush().len();
        old.terminate();
        discarded
    }

    /// Retire this worker.
    ///
    /// Stops accepting jobs, pulls the threadsafe jobs out of the queue and
    /// returns them as a fresh queue for a replacement. Non-threadsafe jobs
    /// stay queued here, in order, and run before the worker stops.
    pub fn dump(&self) -> WorkQueue<J> {
        let _state = self.state.lock();
        let threadsafe = self.current_queue().retire_where(|job| job.is_threadsafe());
        WorkQueue::from_jobs(threadsafe)
    }

    /// Stop after the jobs already queued.
    pub fn terminate(&self) {
        let _state = self.state.lock();
        self.current_queue().terminate();
    }

    /// Trip the cancellation token seen by the running job.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait up to `timeout` for the thread to exit. Returns `false` if it is
    /// still running; the thread is then left detached.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_finished() {
                if let Some(handle) = self.thread.lock().take() {
                    let _ = handle.join();
                }
                return true;
            }
            if Instant::now() >= deadline {
                warn!(worker = %self.name, "Worker did not stop in time, detaching");
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn queue_len(&self) -> usize {
        self.current_queue().len()
    }

    pub fn is_accepting(&self) -> bool {
        !self.current_queue().is_closed()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.lock().as_ref().is_none_or(|h| h.is_finished())
    }

    /// When the current job started, `None` while idle.
    pub fn busy_since(&self) -> Option<Instant> {
        *self.busy_since.lock()
    }

    /// How long the current job has been running.
    pub fn busy_for(&self) -> Option<Duration> {
        self.busy_since().map(|since| since.elapsed())
    }

    /// How long the worker has been waiting for work, `None` while busy.
    pub fn idle_for(&self) -> Option<Duration> {
        match self.busy_since() {
            Some(_) => None,
            None => Some(self.idle_since.lock().elapsed()),
        }
    }
}

impl<J: Job> std::fmt::Debug for Worker<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("queue_len", &self.queue_len())
            .field("busy_since", &self.busy_since())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::mpsc;

    pub(crate) enum Action {
        Record,
        Fail,
        Panic,
        DeclineOnce(AtomicBool),
        Block(Mutex<mpsc::Receiver<()>>),
    }

    pub(crate) struct TestJob {
        pub id: u32,
        pub threadsafe: bool,
        pub action: Action,
    }

    impl TestJob {
        pub fn record(id: u32) -> Self {
            Self { id, threadsafe: false, action: Action::Record }
        }

        pub fn threadsafe(id: u32) -> Self {
            Self { id, threadsafe: true, action: Action::Record }
        }

        pub fn blocking(id: u32) -> (Self, mpsc::Sender<()>) {
            let (tx, rx) = mpsc::channel();
            let job = Self { id, threadsafe: false, action: Action::Block(Mutex::new(rx)) };
            (job, tx)
        }
    }

    impl Job for TestJob {
        fn is_threadsafe(&self) -> bool {
            self.threadsafe
        }

        fn label(&self) -> &str {
            "test_job"
        }

        fn describe(&self) -> String {
            format!("test_job({})", self.id)
        }
    }

    #[derive(Default)]
    pub(crate) struct Recorder {
        pub seen: Mutex<Vec<u32>>,
    }

    impl Processor<TestJob> for Recorder {
        fn process(&self, job: &TestJob, _cancel: &CancelToken) -> Result<(), JobError> {
            match &job.action {
                Action::Record => {}
                Action::Fail => {
                    return Err(JobError::Failed { code: "test", message: "boom".into() });
                }
                Action::Panic => panic!("job {} panicked", job.id),
                Action::DeclineOnce(declined) => {
                    if !declined.swap(true, Ordering::SeqCst) {
                        return Err(JobError::NotAccepted);
                    }
                }
                Action::Block(rx) => {
                    let _ = rx.lock().recv();
                }
            }
            self.seen.lock().push(job.id);
            Ok(())
        }
    }

    pub(crate) fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not met within 5s");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn spawn(recorder: &Arc<Recorder>) -> Arc<Worker<TestJob>> {
        let processor: Arc<dyn Processor<TestJob>> = recorder.clone();
        Worker::spawn("test", processor, WorkQueue::new()).unwrap()
    }

    #[test]
    fn test_failures_and_panics_do_not_stop_worker() {
        let recorder = Arc::new(Recorder::default());
        let worker = spawn(&recorder);

        worker.put(TestJob { id: 1, threadsafe: false, action: Action::Fail }).ok();
        worker.put(TestJob { id: 2, threadsafe: false, action: Action::Panic }).ok();
        worker.put(TestJob::record(3)).ok();
        worker.terminate();

        assert!(worker.join_timeout(Duration::from_secs(5)));
        assert_eq!(*recorder.seen.lock(), vec![3]);
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_terminate_processes_everything_before_sentinel() {
        let recorder = Arc::new(Recorder::default());
        let worker = spawn(&recorder);

        for id in 0..10 {
            worker.put(TestJob::record(id)).ok();
        }
        worker.terminate();
        assert!(worker.put(TestJob::record(99)).is_err());

        assert!(worker.join_timeout(Duration::from_secs(5)));
        assert_eq!(*recorder.seen.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_declined_job_goes_to_back_of_queue() {
        let recorder = Arc::new(Recorder::default());
        let (blocker, release) = TestJob::blocking(0);
        let worker = spawn(&recorder);

        worker.put(blocker).ok();
        worker
            .put(TestJob { id: 1, threadsafe: false, action: Action::DeclineOnce(AtomicBool::new(false)) })
            .ok();
        worker.put(TestJob::record(2)).ok();
        release.send(()).unwrap();

        wait_until(|| recorder.seen.lock().len() == 3);
        assert_eq!(*recorder.seen.lock(), vec![0, 2, 1]);
        worker.terminate();
    }

    #[test]
    fn test_declined_job_runs_before_terminate_sentinel() {
        let recorder = Arc::new(Recorder::default());
        let (blocker, release) = TestJob::blocking(0);
        let worker = spawn(&recorder);

        worker.put(blocker).ok();
        wait_until(|| worker.busy_since().is_some());
        worker
            .put(TestJob { id: 1, threadsafe: false, action: Action::DeclineOnce(AtomicBool::new(false)) })
            .ok();
        worker.terminate();
        release.send(()).unwrap();

        assert!(worker.join_timeout(Duration::from_secs(5)));
        assert_eq!(*recorder.seen.lock(), vec![0, 1]);
    }

    #[test]
    fn test_dumped_worker_retries_declined_serial_job() {
        let recorder = Arc::new(Recorder::default());
        let (blocker, release) = TestJob::blocking(0);
        let worker = spawn(&recorder);

        worker.put(blocker).ok();
        wait_until(|| worker.busy_since().is_some());
        worker
            .put(TestJob { id: 1, threadsafe: false, action: Action::DeclineOnce(AtomicBool::new(false)) })
            .ok();
        worker.put(TestJob::record(2)).ok();
        assert!(worker.dump().is_empty());
        release.send(()).unwrap();

        assert!(worker.join_timeout(Duration::from_secs(5)));
        assert_eq!(*recorder.seen.lock(), vec![0, 2, 1]);
    }

    #[test]
    fn test_put_racing_terminate_is_run_or_refused() {
        for _ in 0..100 {
            let recorder = Arc::new(Recorder::default());
            let worker = spawn(&recorder);
            let producers: Vec<_> = (0..4)
                .map(|p| {
                    let worker = Arc::clone(&worker);
                    thread::spawn(move || {
                        (0..50).filter(|i| worker.put(TestJob::record(p * 100 + i)).is_ok()).count()
                    })
                })
                .collect();
            worker.terminate();

            let accepted: usize = producers.into_iter().map(|h| h.join().unwrap()).sum();
            assert!(worker.join_timeout(Duration::from_secs(5)));
            assert_eq!(recorder.seen.lock().len(), accepted);
        }
    }

    #[test]
    fn test_clear_discards_queue_and_keeps_serving() {
        let recorder = Arc::new(Recorder::default());
        let (blocker, release) = TestJob::blocking(0);
        let worker = spawn(&recorder);

        worker.put(blocker).ok();
        wait_until(|| worker.busy_since().is_some());
        for id in 1..=3 {
            worker.put(TestJob::record(id)).ok();
        }

        assert_eq!(worker.clear(), 3);
        release.send(()).unwrap();
        worker.put(TestJob::record(9)).ok();
        worker.terminate();

        assert!(worker.join_timeout(Duration::from_secs(5)));
        assert_eq!(*recorder.seen.lock(), vec![0, 9]);
    }

    #[test]
    fn test_dump_splits_threadsafe_from_serial_jobs() {
        let recorder = Arc::new(Recorder::default());
        let (blocker, release) = TestJob::blocking(0);
        let worker = spawn(&recorder);

        worker.put(blocker).ok();
        wait_until(|| worker.busy_since().is_some());
        worker.put(TestJob::threadsafe(1)).ok();
        worker.put(TestJob::record(2)).ok();
        worker.put(TestJob::threadsafe(3)).ok();
        worker.put(TestJob::record(4)).ok();

        let fresh = worker.dump();
        let moved: Vec<u32> = fresh.flush().into_iter().map(|p| p.id).collect();
        assert_eq!(moved, vec![1, 3]);
        assert!(!worker.is_accepting());
        assert!(worker.put(TestJob::record(5)).is_err());

        release.send(()).unwrap();
        assert!(worker.join_timeout(Duration::from_secs(5)));
        assert_eq!(*recorder.seen.lock(), vec![0, 2, 4]);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
