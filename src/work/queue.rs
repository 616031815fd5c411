//! Blocking FIFO work queue with sentinel termination.
//!
//! A queue is consumed by exactly one worker at a time. `terminate()` closes
//! the queue to producers and pushes a sentinel behind the queued jobs; the
//! consumer stops when it dequeues it and the queue is marked drained from
//! then on.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

enum Slot<T> {
    Job(T),
    Sentinel,
}

struct Inner<T> {
    slots: VecDeque<Slot<T>>,
    /// Jobs currently queued, sentinel excluded.
    jobs: usize,
    /// Set together with the sentinel; producers are refused from then on.
    closed: bool,
    drained: bool,
}

/// Thread-safe FIFO of jobs.
pub struct WorkQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> WorkQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::from_jobs(std::iter::empty())
    }

    /// Create a queue seeded with `jobs`, in iteration order.
    pub fn from_jobs(jobs: impl IntoIterator<Item = T>) -> Self {
        let slots: VecDeque<_> = jobs.into_iter().map(Slot::Job).collect();
        Self {
            inner: Mutex::new(Inner {
                jobs: slots.len(),
                slots,
                closed: false,
                drained: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append a job. Hands it back if the queue has been terminated.
    pub fn put(&self, job: T) -> Result<(), T> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(job);
        }
        inner.slots.push_back(Slot::Job(job));
        inner.jobs += 1;
        drop(inner);
        self.available.notify_one();
        Ok(())
    }

    /// Append several jobs under a single lock acquisition, so no other
    /// producer can interleave with them. All or nothing: a terminated queue
    /// hands every job back.
    pub fn put_all(&self, jobs: impl IntoIterator<Item = T>) -> Result<(), Vec<T>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(jobs.into_iter().collect());
        }
        for job in jobs {
            inner.slots.push_back(Slot::Job(job));
            inner.jobs += 1;
        }
        drop(inner);
        self.available.notify_one();
        Ok(())
    }

    /// Put a job the consumer already took back in line, ahead of any pending
    /// sentinel so it still runs before the consumer stops.
    ///
    /// Accepted even after `terminate()`: the job was queued before it.
    pub fn requeue(&self, job: T) {
        let mut inner = self.inner.lock();
        let at = inner
            .slots
            .iter()
            .position(|slot| matches!(slot, Slot::Sentinel))
            .unwrap_or(inner.slots.len());
        inner.slots.insert(at, Slot::Job(job));
        inner.jobs += 1;
        drop(inner);
        self.available.notify_one();
    }

    /// Block until the next job is available.
    ///
    /// Returns `None` once the sentinel has been dequeued; every later call
    /// returns `None` immediately.
    pub fn get(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        loop {
            if inner.drained {
                return None;
            }
            match inner.slots.pop_front() {
                Some(Slot::Job(job)) => {
                    inner.jobs -= 1;
                    return Some(job);
                }
                Some(Slot::Sentinel) => {
                    inner.drained = true;
                    return None;
                }
                None => self.available.wait(&mut inner),
            }
        }
    }

    /// Atomically remove and return every queued job.
    ///
    /// A pending sentinel stays in place, so a consumer that was told to stop
    /// still stops.
    pub fn flush(&self) -> Vec<T> {
        self.take_where(|_| true)
    }

    /// Atomically remove the queued jobs matching `pred`, keeping the rest in
    /// their original order.
    pub fn take_where(&self, pred: impl FnMut(&T) -> bool) -> Vec<T> {
        Self::take_locked(&mut self.inner.lock(), pred)
    }

    fn take_locked(inner: &mut Inner<T>, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(inner.slots.len());
        for slot in inner.slots.drain(..) {
            match slot {
                Slot::Job(job) if pred(&job) => taken.push(job),
                other => kept.push_back(other),
            }
        }
        inner.slots = kept;
        inner.jobs -= taken.len();
        taken
    }

    /// Close the queue and enqueue the termination sentinel. Later calls are
    /// no-ops.
    pub fn terminate(&self) {
        let mut inner = self.inner.lock();
        Self::close(&mut inner);
        drop(inner);
        self.available.notify_all();
    }

    /// Take the jobs matching `pred` and terminate, as one step.
    ///
    /// A concurrent producer either lands before the split or is refused;
    /// nothing can slip in behind the sentinel.
    pub fn retire_where(&self, pred: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut inner = self.inner.lock();
        let taken = Self::take_locked(&mut inner, pred);
        Self::close(&mut inner);
        drop(inner);
        self.available.notify_all();
        taken
    }

    fn close(inner: &mut Inner<T>) {
        if !inner.closed {
            inner.closed = true;
            inner.slots.push_back(Slot::Sentinel);
        }
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.inner.lock().jobs
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `terminate()` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Whether the sentinel has been consumed.
    pub fn is_drained(&self) -> bool {
        self.inner.lock().drained
    }

    /// Iterate jobs until the sentinel is reached.
    pub fn iter(&self) -> Jobs<'_, T> {
        Jobs { queue: self }
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("WorkQueue")
            .field("jobs", &inner.jobs)
            .field("closed", &inner.closed)
            .field("drained", &inner.drained)
            .finish()
    }
}

/// Blocking iterator over a [`WorkQueue`].
pub struct Jobs<'a, T> {
    queue: &'a WorkQueue<T>,
}

impl<T> Iterator for Jobs<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.queue.get()
    }
}
