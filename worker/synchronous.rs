use super::{Runnable, Worker, WorkerError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Runs every task inline on the submitting thread.
///
/// Reports one logical worker thread. Admission always succeeds, and by the time
/// `ask_to_perform_task` returns the task is terminal.
#[derive(Debug, Default)]
pub struct SynchronousWorker {
    completed: AtomicUsize,
}

impl SynchronousWorker {
    pub fn new() -> Self {
        Self::default()
    }

    fn perform(&self, task: &dyn Runnable) {
        if let Err(err) = task.run(&self.completed) {
            log::error!("Inline task failed: {err}");
        }
    }
}

impl Worker for SynchronousWorker {
    fn ask_to_perform_task(&self, task: Arc<dyn Runnable>) -> bool {
        self.perform(task.as_ref());
        true
    }

    fn tell_to_perform_task(&self, task: Arc<dyn Runnable>) -> Result<(), WorkerError> {
        self.perform(task.as_ref());
        Ok(())
    }

    fn number_of_worker_threads(&self) -> usize {
        1
    }

    fn tasks_completed_per_thread(&self) -> Vec<usize> {
        vec![self.completed.load(Ordering::Acquire)]
    }
}
