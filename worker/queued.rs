use super::{DEFAULT_QUEUE_CAPACITY, Runnable, Worker, WorkerError};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

/// A fixed set of threads draining one bounded task queue.
///
/// `ask_to_perform_task` enqueues only if there is room; `tell_to_perform_task` blocks
/// on a full queue until a thread pops a task. Dropping the worker closes the queue,
/// lets the threads drain what is already queued, and joins them.
///
/// A thread whose task fails stops running tasks. When the last one does, it stays
/// attached to the queue and abandons every task it receives, so nothing accepted by
/// the queue is left without a terminal status.
pub struct QueuedPoolWorker {
    sender: Option<Sender<Arc<dyn Runnable>>>,
    threads: Vec<JoinHandle<()>>,
    completed: Arc<Vec<AtomicUsize>>,
    live_threads: Arc<AtomicUsize>,
    capacity: usize,
}

impl QueuedPoolWorker {
    pub fn new(threads: usize) -> Result<Self, WorkerError> {
        Self::with_capacity(threads, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(threads: usize, capacity: usize) -> Result<Self, WorkerError> {
        if threads == 0 {
            return Err(WorkerError::NoThreads);
        }
        if capacity == 0 {
            return Err(WorkerError::ZeroQueueCapacity);
        }

        let (sender, receiver) = bounded::<Arc<dyn Runnable>>(capacity);
        let completed: Arc<Vec<AtomicUsize>> =
            Arc::new((0..threads).map(|_| AtomicUsize::new(0)).collect());
        let live_threads = Arc::new(AtomicUsize::new(threads));
        let mut pool = Self {
            sender: Some(sender),
            threads: Vec::with_capacity(threads),
            completed: Arc::clone(&completed),
            live_threads: Arc::clone(&live_threads),
            capacity,
        };
        for index in 0..threads {
            let receiver = receiver.clone();
            let completed = Arc::clone(&completed);
            let live_threads = Arc::clone(&live_threads);
            let handle = thread::Builder::new()
                .name(format!("kinship-queue-{index}"))
                .spawn(move || drain_queue(&receiver, &completed[index], &live_threads, index))
                .map_err(|source| WorkerError::Spawn { index, source })?;
            pool.threads.push(handle);
        }
        Ok(pool)
    }

    pub fn queue_capacity(&self) -> usize {
        self.capacity
    }

    /// Tasks waiting in the queue, not yet picked up by a thread.
    pub fn queued_tasks(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    fn has_live_threads(&self) -> bool {
        self.live_threads.load(Ordering::Acquire) > 0
    }
}

fn drain_queue(
    receiver: &Receiver<Arc<dyn Runnable>>,
    completed: &AtomicUsize,
    live_threads: &AtomicUsize,
    index: usize,
) {
    for task in receiver.iter() {
        if let Err(err) = task.run(completed) {
            log::error!("Queue thread {index} stopping after task failure: {err}");
            if live_threads.fetch_sub(1, Ordering::AcqRel) == 1 {
                abandon_queue(receiver, index);
            }
            return;
        }
    }
}

// Runs on the last thread to fail, until the worker is dropped and the queue closes.
fn abandon_queue(receiver: &Receiver<Arc<dyn Runnable>>, index: usize) {
    let mut abandoned = 0usize;
    for task in receiver.iter() {
        task.abandon();
        abandoned += 1;
    }
    if abandoned > 0 {
        log::warn!(
            "Queue thread {index} abandoned {abandoned} task(s) left without a live thread"
        );
    }
}

impl Worker for QueuedPoolWorker {
    fn ask_to_perform_task(&self, task: Arc<dyn Runnable>) -> bool {
        if !self.has_live_threads() {
            return false;
        }
        match &self.sender {
            Some(sender) => match sender.try_send(task) {
                Ok(()) => true,
                Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => false,
            },
            None => false,
        }
    }

    fn tell_to_perform_task(&self, task: Arc<dyn Runnable>) -> Result<(), WorkerError> {
        if !self.has_live_threads() {
            return Err(WorkerError::NoLiveThreads);
        }
        let sender = self.sender.as_ref().ok_or(WorkerError::NoLiveThreads)?;
        sender.send(task).map_err(|_| WorkerError::NoLiveThreads)
    }

    fn number_of_worker_threads(&self) -> usize {
        self.completed.len()
    }

    fn tasks_completed_per_thread(&self) -> Vec<usize> {
        self.completed
            .iter()
            .map(|count| count.load(Ordering::Acquire))
            .collect()
    }
}

impl Drop for QueuedPoolWorker {
    fn drop(&mut self) {
        // Closing the channel ends each thread's loop once the queue is empty.
        drop(self.sender.take());
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::error!("A queue thread panicked outside of a task");
            }
        }
        log::debug!("Queued pool worker shut down");
    }
}
