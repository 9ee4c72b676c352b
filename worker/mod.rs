// ========================================================================================
//
//                      The task / worker concurrency substrate
//
// ========================================================================================
//
// A `Task` is a one-shot unit of work that becomes observably complete exactly once.
// A `Worker` decides *how* tasks run. Three schedulers are provided and are fully
// interchangeable behind the `Worker` trait:
//
//   * `SynchronousWorker`  - runs every task inline on the submitting thread.
//   * `FixedPoolWorker`    - N parked threads, one slot each, non-blocking admission.
//   * `QueuedPoolWorker`   - N threads draining a bounded queue.
//
// Workers never retry work. A task that panics is recorded as failed, its waiters are
// woken, and the pool thread that ran it stops taking work.

pub mod pool;
pub mod queued;
pub mod synchronous;
pub mod task;

pub use pool::FixedPoolWorker;
pub use queued::QueuedPoolWorker;
pub use synchronous::SynchronousWorker;
pub use task::{Runnable, Task, TaskError, TaskStatus};

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Default capacity of the bounded queue used by [`QueuedPoolWorker`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;

/// Errors surfaced at the admission boundary of a worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("a thread pool worker needs at least one thread")]
    NoThreads,

    #[error("the task queue capacity must be at least one")]
    ZeroQueueCapacity,

    #[error("failed to start worker thread {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("every worker thread has exited; no task can be accepted")]
    NoLiveThreads,
}

/// A scheduler that runs [`Runnable`] tasks.
///
/// `ask_to_perform_task` never blocks on capacity: it returns `false` when the worker
/// cannot take the task right now, and `true` once the worker has committed to running
/// it. `tell_to_perform_task` blocks until the task is accepted, and fails only when the
/// worker can never accept work again.
pub trait Worker: Send + Sync {
    fn ask_to_perform_task(&self, task: Arc<dyn Runnable>) -> bool;

    fn tell_to_perform_task(&self, task: Arc<dyn Runnable>) -> Result<(), WorkerError>;

    fn number_of_worker_threads(&self) -> usize;

    /// Completed-task counts, one entry per worker thread.
    fn tasks_completed_per_thread(&self) -> Vec<usize>;

    fn number_of_tasks_completed(&self) -> usize {
        self.tasks_completed_per_thread().iter().sum()
    }

    fn summary_of_work_so_far(&self) -> String {
        let per_thread = self.tasks_completed_per_thread();
        let mut summary = format!(
            "Tasks carried out by {} worker threads:\n",
            self.number_of_worker_threads()
        );
        for (index, completed) in per_thread.iter().enumerate() {
            let _ = writeln!(summary, "thread {index:>3}: {completed}");
        }
        summary
    }
}

/// Selects one of the three scheduling models.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    Synchronous,
    #[default]
    Pool,
    Queued,
}

/// Worker section of the engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    pub kind: WorkerKind,
    /// Number of OS threads. Zero always selects the synchronous worker.
    pub threads: usize,
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            kind: WorkerKind::default(),
            threads: num_cpus::get().max(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl WorkerConfig {
    /// Builds the configured worker. Threads start immediately.
    pub fn spawn(&self) -> Result<Arc<dyn Worker>, WorkerError> {
        if self.threads == 0 {
            return Ok(Arc::new(SynchronousWorker::new()));
        }
        let worker: Arc<dyn Worker> = match self.kind {
            WorkerKind::Synchronous => Arc::new(SynchronousWorker::new()),
            WorkerKind::Pool => Arc::new(FixedPoolWorker::new(self.threads)?),
            WorkerKind::Queued => Arc::new(QueuedPoolWorker::with_capacity(
                self.threads,
                self.queue_capacity,
            )?),
        };
        log::debug!(
            "Started {:?} worker with {} thread(s)",
            self.kind,
            worker.number_of_worker_threads()
        );
        Ok(worker)
    }
}

/// Locks a mutex, recovering the guard if a previous holder panicked.
///
/// Task panics are caught before any substrate lock is taken, so poisoning can only
/// come from a bug in the substrate itself; the protected state is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
