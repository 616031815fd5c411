//! Elastic worker pool for THREADSAFE handlers.
//!
//! Jobs go to the worker with the shortest queue. Membership only changes in
//! [`PoolExecutor::rebalance`], which the dispatcher runs once per line:
//!
//! 1. Growth: every worker busy and the longest queue above
//!    `backlog_threshold`, below `max_workers`. The most backlogged worker is
//!    retired; its threadsafe backlog moves to a replacement and one more
//!    fresh worker joins (net +1).
//! 2. Stall: a worker whose current job has run longer than
//!    `stall_threshold` is cancelled and replaced the same way.
//! 3. Shrink: above `min_workers`, one worker idle with an empty queue for
//!    longer than `idle_retire` is terminated.
//!
//! Retired workers keep their non-threadsafe jobs and run them, in order,
//! before exiting.

use super::Executor;
use crate::config::DispatchConfig;
use crate::metrics;
use crate::work::{Job, Processor, WorkQueue, Worker};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Sizing and thresholds for a [`PoolExecutor`].
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub initial_workers: usize,
    pub min_workers: usize,
    pub max_workers: usize,
    pub backlog_threshold: usize,
    pub stall_threshold: Duration,
    pub idle_retire: Duration,
}

impl From<&DispatchConfig> for PoolSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            initial_workers: config.pool_workers,
            min_workers: config.min_pool_workers,
            max_workers: config.max_pool_workers,
            backlog_threshold: config.backlog_threshold,
            stall_threshold: config.stall_threshold(),
            idle_retire: config.idle_retire(),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

/// What one [`PoolExecutor::rebalance`] pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebalanceReport {
    pub grown: bool,
    pub stalled: usize,
    pub retired: usize,
}

impl RebalanceReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

pub struct PoolExecutor<J: Job> {
    processor: Arc<dyn Processor<J>>,
    settings: PoolSettings,
    workers: Vec<Arc<Worker<J>>>,
    /// Workers taken out of rotation that may still be finishing jobs.
    retired: Vec<Arc<Worker<J>>>,
}

impl<J: Job> PoolExecutor<J> {
    pub fn new(processor: Arc<dyn Processor<J>>, mut settings: PoolSettings) -> io::Result<Self> {
        settings.min_workers = settings.min_workers.max(1);
        settings.max_workers = settings.max_workers.max(settings.min_workers);
        settings.initial_workers = settings
            .initial_workers
            .clamp(settings.min_workers, settings.max_workers);

        let workers = (0..settings.initial_workers)
            .map(|_| Worker::spawn("pool", Arc::clone(&processor), WorkQueue::new()))
            .collect::<io::Result<Vec<_>>>()?;
        metrics::set_pool_workers(workers.len());

        Ok(Self {
            processor,
            settings,
            workers,
            retired: Vec::new(),
        })
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Workers currently in rotation.
    pub fn workers(&self) -> &[Arc<Worker<J>>] {
        &self.workers
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Retired workers whose threads have not exited yet.
    pub fn retired_len(&self) -> usize {
        self.retired.iter().filter(|w| !w.is_finished()).count()
    }

    /// Adjust pool membership. See the module docs for the rules.
    pub fn rebalance(&mut self) -> RebalanceReport {
        let mut report = RebalanceReport::default();
        self.reap_retired();

        if self.workers.len() < self.settings.max_workers && self.all_busy() {
            let backlog = self
                .most_backlogged()
                .filter(|&(_, depth)| depth > self.settings.backlog_threshold);
            if let Some((idx, _)) = backlog {
                report.grown = self.grow(idx);
            }
        }

        for idx in 0..self.workers.len() {
            let stalled = self.workers[idx]
                .busy_for()
                .filter(|busy| *busy > self.settings.stall_threshold);
            if let Some(busy) = stalled {
                if self.replace_stalled(idx, busy) {
                    report.stalled += 1;
                }
            }
        }

        if self.workers.len() > self.settings.min_workers {
            let idle = self.workers.iter().position(|w| {
                w.queue_len() == 0 && w.idle_for().is_some_and(|idle| idle > self.settings.idle_retire)
            });
            if let Some(idx) = idle {
                let victim = self.workers.remove(idx);
                victim.terminate();
                debug!(worker = %victim.name(), pool = self.workers.len(), "Idle pool worker retired");
                metrics::record_pool_event("idle_retired");
                self.retired.push(victim);
                report.retired += 1;
            }
        }

        if !report.is_noop() {
            metrics::set_pool_workers(self.workers.len());
        }
        report
    }

    fn all_busy(&self) -> bool {
        !self.workers.is_empty() && self.workers.iter().all(|w| w.busy_since().is_some())
    }

    /// Index and depth of the longest queue, first one on ties.
    fn most_backlogged(&self) -> Option<(usize, usize)> {
        self.workers
            .iter()
            .map(|w| w.queue_len())
            .enumerate()
            .fold(None, |best, (idx, depth)| match best {
                Some((_, max)) if max >= depth => best,
                _ => Some((idx, depth)),
            })
    }

    fn grow(&mut self, idx: usize) -> bool {
        let Some(replacement) = self.spawn_worker() else {
            return false;
        };
        let Some(fresh) = self.spawn_worker() else {
            replacement.terminate();
            self.retired.push(replacement);
            return false;
        };

        let victim = self.workers.remove(idx);
        let moved = hand_over(&victim, &replacement);
        info!(
            retired = %victim.name(),
            moved,
            pool = self.workers.len() + 2,
            "Pool backlogged, growing"
        );
        self.workers.push(replacement);
        self.workers.push(fresh);
        self.retired.push(victim);
        metrics::record_pool_event("grown");
        true
    }

    fn replace_stalled(&mut self, idx: usize, busy: Duration) -> bool {
        let Some(replacement) = self.spawn_worker() else {
            return false;
        };
        let victim = std::mem::replace(&mut self.workers[idx], replacement);
        victim.cancel();
        let moved = hand_over(&victim, &self.workers[idx]);
        warn!(
            worker = %victim.name(),
            busy_ms = busy.as_millis() as u64,
            moved,
            "Pool worker stalled, replaced"
        );
        self.retired.push(victim);
        metrics::record_pool_event("stalled");
        true
    }

    fn spawn_worker(&self) -> Option<Arc<Worker<J>>> {
        match Worker::spawn("pool", Arc::clone(&self.processor), WorkQueue::new()) {
            Ok(worker) => Some(worker),
            Err(e) => {
                error!(error = %e, "Failed to spawn pool worker");
                None
            }
        }
    }

    fn reap_retired(&mut self) {
        self.retired.retain(|w| {
            if w.is_finished() {
                w.join_timeout(Duration::ZERO);
                false
            } else {
                true
            }
        });
    }
}

/// Retire `victim` and move its threadsafe backlog to `replacement`.
fn hand_over<J: Job>(victim: &Worker<J>, replacement: &Worker<J>) -> usize {
    let backlog = victim.dump().flush();
    let moved = backlog.len();
    if let Err(jobs) = replacement.put_all(backlog) {
        error!(worker = %replacement.name(), dropped = jobs.len(), "Replacement refused backlog");
        return 0;
    }
    moved
}

impl<J: Job> Executor<J> for PoolExecutor<J> {
    /// Submit to the shortest queue, first worker on ties.
    fn call(&self, job: J) {
        let Some(worker) = self.workers.iter().min_by_key(|w| w.queue_len()) else {
            warn!(job = %job.describe(), "Pool has no workers, dropping job");
            return;
        };
        if let Err(job) = worker.put(job) {
            warn!(worker = %worker.name(), job = %job.describe(), "Pool worker refused job");
        }
    }

    fn shutdown(&mut self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        for worker in &self.workers {
            worker.terminate();
        }

        let mut clean = true;
        for worker in self.workers.drain(..).chain(self.retired.drain(..)) {
            if worker.is_cancelled() && !worker.is_finished() {
                debug!(worker = %worker.name(), "Detaching stalled pool worker");
                clean = false;
                continue;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            clean &= worker.join_timeout(left);
        }
        metrics::set_pool_workers(0);
        clean
    }
}

impl<J: Job> std::fmt::Debug for PoolExecutor<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let depths: Vec<usize> = self.workers.iter().map(|w| w.queue_len()).collect();
        f.debug_struct("PoolExecutor")
            .field("depths", &depths)
            .field("retired", &self.retired.len())
            .finish()
    }
}
