use super::lock;
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use thiserror::Error;

/// Lifecycle of a [`Task`]. `Complete` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    NotStarted,
    Running,
    Complete,
    Failed,
}

impl TaskStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was abandoned because no worker thread was left to run it")]
    Abandoned,

    #[error("task output has already been taken")]
    OutputTaken,

    #[error("task has not completed")]
    Incomplete,
}

/// The worker-facing side of a task: something that can be run exactly once.
///
/// `run` returns `Err` only when the work function panicked. The task is already
/// terminal (and its waiters woken) by the time the error reaches the worker.
///
/// A successful run increments `completed` before any waiter is woken, so a thread that
/// has waited on a task always sees it counted.
pub trait Runnable: Send + Sync {
    fn run(&self, completed: &AtomicUsize) -> Result<(), TaskError>;

    /// Fails a task that will never be run. No-op once the task has started.
    fn abandon(&self);

    fn status(&self) -> TaskStatus;
}

type Work<T> = Box<dyn FnOnce() -> T + Send>;

struct TaskState<T> {
    status: TaskStatus,
    output: Option<T>,
    failure: Option<TaskError>,
}

/// A one-shot unit of work producing a value of type `T`.
///
/// The work function is consumed by the first call to `run`; any later call is a no-op.
/// Any number of threads may block in [`Task::wait_until_complete`].
pub struct Task<T> {
    work: Mutex<Option<Work<T>>>,
    state: Mutex<TaskState<T>>,
    finished: Condvar,
}

impl<T: Send + 'static> Task<T> {
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self {
            work: Mutex::new(Some(Box::new(work))),
            state: Mutex::new(TaskState {
                status: TaskStatus::NotStarted,
                output: None,
                failure: None,
            }),
            finished: Condvar::new(),
        }
    }

    /// Non-blocking snapshot: true once the task has finished, successfully or not.
    pub fn is_complete(&self) -> bool {
        lock(&self.state).status.is_terminal()
    }

    /// Blocks the calling thread until the task is terminal. Returns immediately if it
    /// already is.
    pub fn wait_until_complete(&self) {
        let mut state = lock(&self.state);
        while !state.status.is_terminal() {
            state = self
                .finished
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Moves the work function's return value out of a terminal task.
    pub fn take_output(&self) -> Result<T, TaskError> {
        let mut state = lock(&self.state);
        match state.status {
            TaskStatus::Complete => state.output.take().ok_or(TaskError::OutputTaken),
            TaskStatus::Failed => Err(state
                .failure
                .clone()
                .unwrap_or(TaskError::Panicked(String::new()))),
            TaskStatus::NotStarted | TaskStatus::Running => Err(TaskError::Incomplete),
        }
    }

    fn finish(&self, outcome: Result<T, TaskError>) {
        {
            let mut state = lock(&self.state);
            match outcome {
                Ok(output) => {
                    state.output = Some(output);
                    state.status = TaskStatus::Complete;
                }
                Err(failure) => {
                    state.failure = Some(failure);
                    state.status = TaskStatus::Failed;
                }
            }
        }
        self.finished.notify_all();
    }
}

impl<T: Send + 'static> Runnable for Task<T> {
    fn run(&self, completed: &AtomicUsize) -> Result<(), TaskError> {
        let Some(work) = lock(&self.work).take() else {
            return Ok(());
        };
        lock(&self.state).status = TaskStatus::Running;

        match catch_unwind(AssertUnwindSafe(work)) {
            Ok(output) => {
                completed.fetch_add(1, Ordering::AcqRel);
                self.finish(Ok(output));
                Ok(())
            }
            Err(payload) => {
                let failure = TaskError::Panicked(panic_message(payload.as_ref()));
                self.finish(Err(failure.clone()));
                Err(failure)
            }
        }
    }

    fn abandon(&self) {
        if lock(&self.work).take().is_some() {
            self.finish(Err(TaskError::Abandoned));
        }
    }

    fn status(&self) -> TaskStatus {
        lock(&self.state).status
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("status", &lock(&self.state).status)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
