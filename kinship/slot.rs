use crate::error::KinshipError;
use crate::worker::{Task, Worker};
use std::mem;
use std::sync::Arc;

/// One engine-owned task slot and the state that travels through it.
///
/// The state `S` (an accumulator) is moved into each task and moved back out once the
/// task completes, so it is only ever touched by one thread at a time.
pub(crate) enum TaskSlot<S> {
    Idle(S),
    Busy(Arc<Task<S>>),
    /// The state is in flight between `reclaim` and `dispatch`, or was lost to a failed
    /// task.
    Vacant,
}

impl<S: Send + 'static> TaskSlot<S> {
    /// Takes the slot's state back, waiting for the outstanding task first if there is one.
    pub(crate) fn reclaim(&mut self, index: usize) -> Result<S, KinshipError> {
        match mem::replace(self, Self::Vacant) {
            Self::Idle(state) => Ok(state),
            Self::Busy(task) => {
                task.wait_until_complete();
                Ok(task.take_output()?)
            }
            Self::Vacant => Err(KinshipError::SlotUnavailable { slot: index }),
        }
    }

    /// Hands `work` to the worker as a fresh task. The slot only becomes busy once the
    /// worker has accepted it.
    pub(crate) fn dispatch<F>(&mut self, worker: &dyn Worker, work: F) -> Result<(), KinshipError>
    where
        F: FnOnce() -> S + Send + 'static,
    {
        debug_assert!(matches!(self, Self::Vacant));
        let task = Arc::new(Task::new(work));
        worker.tell_to_perform_task(task.clone())?;
        *self = Self::Busy(task);
        Ok(())
    }

    pub(crate) fn wait(&self) {
        if let Self::Busy(task) = self {
            task.wait_until_complete();
        }
    }
}
