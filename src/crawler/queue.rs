//! Repeating job queue
//!
//! A FIFO queue that runs exactly one job at a time. In repeat mode a
//! completed job is re-appended to the tail before the next one starts,
//! which yields perpetual round-robin over however many jobs were added.
//! Fairness is structural: no job runs twice before every other queued
//! job has run once.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// A queued unit of work: a factory producing one run of the job
pub type Job = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct Inner {
    jobs: VecDeque<Job>,
    working: bool,
    stopped: bool,
}

/// Single-concurrency repeating job queue
pub struct Queue {
    inner: Mutex<Inner>,
    repeat: bool,
}

impl Queue {
    /// Creates a queue
    ///
    /// # Arguments
    ///
    /// * `repeat` - Whether completed jobs rejoin the tail of the queue
    pub fn new(repeat: bool) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                jobs: VecDeque::new(),
                working: false,
                stopped: false,
            }),
            repeat,
        })
    }

    /// Appends a job and starts the queue if it is idle
    pub fn add(self: &Arc<Self>, job: Job) {
        {
            let mut inner = self.lock();
            if inner.stopped {
                return;
            }
            inner.jobs.push_back(job);
        }
        self.start();
    }

    /// Number of jobs currently waiting (not counting one in flight)
    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().jobs.is_empty()
    }

    /// Stops the queue after the in-flight job finishes
    ///
    /// Pending jobs are dropped; further `add` calls are ignored.
    pub fn stop(&self) {
        let mut inner = self.lock();
        inner.stopped = true;
        inner.jobs.clear();
    }

    /// Pops and runs the head job if nothing is already running
    fn start(self: &Arc<Self>) {
        let job = {
            let mut inner = self.lock();
            if inner.working || inner.stopped {
                return;
            }
            let Some(job) = inner.jobs.pop_front() else {
                return;
            };
            if self.repeat {
                inner.jobs.push_back(job.clone());
            }
            inner.working = true;
            job
        };

        let queue = self.clone();
        tokio::spawn(async move {
            job().await;
            queue.lock().working = false;
            queue.start();
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Jobs never panic while holding this lock; poisoning would mean a
        // bug in the queue itself.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
