// Licensed under the Apache-2.0 license

//! Deferred execution contexts.
//!
//! Interrupt handlers never do mailbox work themselves. They schedule one of
//! two kinds of task:
//!
//! - `Soft` tasks drain receive FIFOs. They run on a single executor thread
//!   shared by every endpoint and must not block.
//! - `Worker` tasks flush transmit queues. They run on a separate executor and
//!   are allowed to wait on the hardware.
//!
//! Scheduling is coalescing: a task that is already queued is not queued a
//! second time, while a task rescheduled from inside its own body runs again.

use crate::lock;
use log::{debug, error, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskContext {
    /// Short, non-blocking context (receive drain).
    Soft,
    /// Blocking background context (transmit flush).
    Worker,
}

enum Job {
    Run(Arc<TaskInner>),
    Stop,
}

struct TaskInner {
    name: String,
    context: TaskContext,
    pending: AtomicBool,
    runs: AtomicU64,
    body: Box<dyn Fn() + Send + Sync>,
}

/// Counts jobs that have been queued but have not finished running.
#[derive(Default)]
struct Outstanding {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Outstanding {
    fn add(&self) {
        *lock(&self.count) += 1;
    }

    fn done(&self) {
        let mut count = lock(&self.count);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_zero(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = lock(&self.count);
        while *count > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            count = self
                .idle
                .wait_timeout(count, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

#[derive(Clone)]
struct Spawner {
    tx: Sender<Job>,
    outstanding: Arc<Outstanding>,
}

/// Handle to a unit of deferred work bound to one execution context.
#[derive(Clone)]
pub struct DeferredTask {
    inner: Arc<TaskInner>,
    spawner: Spawner,
}

impl DeferredTask {
    /// Queues the task on its executor.
    ///
    /// Returns false if the task was already pending or the runtime has been
    /// shut down.
    pub fn schedule(&self) -> bool {
        if self.inner.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.spawner.outstanding.add();
        if self.spawner.tx.send(Job::Run(self.inner.clone())).is_err() {
            warn!(
                "Deferred task {} scheduled after runtime shutdown",
                self.inner.name
            );
            self.inner.pending.store(false, Ordering::Release);
            self.spawner.outstanding.done();
            return false;
        }
        true
    }

    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Number of times the task body has started.
    pub fn run_count(&self) -> u64 {
        self.inner.runs.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn context(&self) -> TaskContext {
        self.inner.context
    }
}

/// Owns the soft and worker executor threads.
pub struct DeferredRuntime {
    soft: Spawner,
    worker: Spawner,
    outstanding: Arc<Outstanding>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for DeferredRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredRuntime {
    /// Starts both executor threads.
    pub fn new() -> Self {
        let outstanding = Arc::new(Outstanding::default());
        let (soft_tx, soft_rx) = mpsc::channel();
        let (worker_tx, worker_rx) = mpsc::channel();

        let soft_outstanding = outstanding.clone();
        let soft_handle = std::thread::spawn(move || {
            Self::executor_loop(TaskContext::Soft, soft_rx, soft_outstanding)
        });
        let worker_outstanding = outstanding.clone();
        let worker_handle = std::thread::spawn(move || {
            Self::executor_loop(TaskContext::Worker, worker_rx, worker_outstanding)
        });

        Self {
            soft: Spawner {
                tx: soft_tx,
                outstanding: outstanding.clone(),
            },
            worker: Spawner {
                tx: worker_tx,
                outstanding: outstanding.clone(),
            },
            outstanding,
            handles: Mutex::new(vec![soft_handle, worker_handle]),
        }
    }

    /// Creates a task that runs `body` in `context` each time it is scheduled.
    pub fn task<F>(&self, name: &str, context: TaskContext, body: F) -> DeferredTask
    where
        F: Fn() + Send + Sync + 'static,
    {
        let spawner = match context {
            TaskContext::Soft => self.soft.clone(),
            TaskContext::Worker => self.worker.clone(),
        };
        DeferredTask {
            inner: Arc::new(TaskInner {
                name: name.to_string(),
                context,
                pending: AtomicBool::new(false),
                runs: AtomicU64::new(0),
                body: Box::new(body),
            }),
            spawner,
        }
    }

    /// Blocks until every scheduled task, including tasks scheduled by other
    /// tasks, has finished. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.outstanding.wait_zero(timeout)
    }

    /// Stops both executors after the work already queued has run.
    pub fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = lock(&self.handles).drain(..).collect();
        if handles.is_empty() {
            return;
        }
        let _ = self.soft.tx.send(Job::Stop);
        let _ = self.worker.tx.send(Job::Stop);
        for handle in handles {
            // Dropped from inside a task: that executor exits on its own.
            if handle.thread().id() == std::thread::current().id() {
                continue;
            }
            if handle.join().is_err() {
                error!("Deferred executor thread panicked");
            }
        }
        debug!("Deferred runtime stopped");
    }

    fn executor_loop(context: TaskContext, rx: Receiver<Job>, outstanding: Arc<Outstanding>) {
        debug!("{:?} executor running", context);
        while let Ok(job) = rx.recv() {
            match job {
                Job::Run(task) => {
                    task.pending.store(false, Ordering::Release);
                    task.runs.fetch_add(1, Ordering::Relaxed);
                    if panic::catch_unwind(AssertUnwindSafe(|| (task.body)())).is_err() {
                        error!("Deferred task {} panicked", task.name);
                    }
                    outstanding.done();
                }
                Job::Stop => break,
            }
        }
        debug!("{:?} executor exiting", context);
    }
}

impl Drop for DeferredRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
