use super::{Runnable, Worker, WorkerError, lock};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

// Slot states. A slot moves IDLE -> RESERVED -> PROCESSING -> IDLE under normal operation,
// IDLE -> TERMINATING -> EXITED on shutdown, and PROCESSING -> EXITED when its task panics.
const IDLE: u8 = 0;
const RESERVED: u8 = 1;
const PROCESSING: u8 = 2;
const TERMINATING: u8 = 3;
const EXITED: u8 = 4;

struct Slot {
    state: AtomicU8,
    task: Mutex<Option<Arc<dyn Runnable>>>,
    completed: AtomicUsize,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(IDLE),
            task: Mutex::new(None),
            completed: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }
}

/// A fixed set of parked threads, each owning one task slot.
///
/// Admission is non-blocking: `ask_to_perform_task` claims the first idle slot or
/// reports that every thread is busy. Nothing is buffered beyond one task per thread.
pub struct FixedPoolWorker {
    slots: Arc<Vec<Slot>>,
    threads: Vec<JoinHandle<()>>,
}

impl FixedPoolWorker {
    /// Starts `threads` OS threads. They park until a task is installed in their slot.
    pub fn new(threads: usize) -> Result<Self, WorkerError> {
        if threads == 0 {
            return Err(WorkerError::NoThreads);
        }
        let slots: Arc<Vec<Slot>> = Arc::new((0..threads).map(|_| Slot::new()).collect());
        let mut pool = Self {
            slots: Arc::clone(&slots),
            threads: Vec::with_capacity(threads),
        };
        for index in 0..threads {
            let slots = Arc::clone(&slots);
            // On failure the partially built pool is dropped, which stops the threads
            // already started.
            let handle = thread::Builder::new()
                .name(format!("kinship-pool-{index}"))
                .spawn(move || serve_slot(&slots, index))
                .map_err(|source| WorkerError::Spawn { index, source })?;
            pool.threads.push(handle);
        }
        Ok(pool)
    }

    fn all_threads_exited(&self) -> bool {
        self.slots.iter().all(|slot| slot.state() == EXITED)
    }
}

fn serve_slot(slots: &[Slot], index: usize) {
    let slot = &slots[index];
    loop {
        match slot.state() {
            PROCESSING => {
                let task = lock(&slot.task).take();
                let outcome = task.map_or(Ok(()), |task| task.run(&slot.completed));
                match outcome {
                    Ok(()) => slot.state.store(IDLE, Ordering::Release),
                    Err(err) => {
                        log::error!("Pool thread {index} stopping after task failure: {err}");
                        slot.state.store(EXITED, Ordering::Release);
                        return;
                    }
                }
            }
            TERMINATING => {
                slot.state.store(EXITED, Ordering::Release);
                return;
            }
            _ => thread::park(),
        }
    }
}

impl Worker for FixedPoolWorker {
    fn ask_to_perform_task(&self, task: Arc<dyn Runnable>) -> bool {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot
                .state
                .compare_exchange(IDLE, RESERVED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                *lock(&slot.task) = Some(task);
                slot.state.store(PROCESSING, Ordering::Release);
                if let Some(handle) = self.threads.get(index) {
                    handle.thread().unpark();
                }
                return true;
            }
        }
        false
    }

    fn tell_to_perform_task(&self, task: Arc<dyn Runnable>) -> Result<(), WorkerError> {
        loop {
            if self.ask_to_perform_task(Arc::clone(&task)) {
                return Ok(());
            }
            if self.all_threads_exited() {
                return Err(WorkerError::NoLiveThreads);
            }
            thread::yield_now();
        }
    }

    fn number_of_worker_threads(&self) -> usize {
        self.slots.len()
    }

    fn tasks_completed_per_thread(&self) -> Vec<usize> {
        self.slots
            .iter()
            .map(|slot| slot.completed.load(Ordering::Acquire))
            .collect()
    }
}

impl Drop for FixedPoolWorker {
    fn drop(&mut self) {
        // Let in-flight tasks finish; no task is interrupted.
        while !self
            .slots
            .iter()
            .all(|slot| matches!(slot.state(), IDLE | EXITED))
        {
            thread::yield_now();
        }
        for slot in self.slots.iter() {
            let _ = slot.state.compare_exchange(
                IDLE,
                TERMINATING,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
        for handle in self.threads.drain(..) {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::error!("A pool thread panicked outside of a task");
            }
        }
        log::debug!("Fixed pool worker shut down");
    }
}
