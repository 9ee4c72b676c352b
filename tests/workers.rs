use kinship::worker::{
    FixedPoolWorker, QueuedPoolWorker, Runnable, SynchronousWorker, Task, Worker, WorkerConfig,
    WorkerKind,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

struct Multiply {
    value: f64,
    factor: f64,
}

impl Multiply {
    fn into_task(self, executions: Arc<AtomicUsize>) -> Arc<Task<f64>> {
        Arc::new(Task::new(move || {
            executions.fetch_add(1, Ordering::SeqCst);
            self.value * self.factor
        }))
    }
}

fn submit_all(worker: &dyn Worker, tasks: &[Arc<Task<f64>>]) {
    let mut pending: Vec<Arc<dyn Runnable>> = Vec::new();
    // First try non-blocking admission, then block for whatever was refused.
    for task in tasks {
        let task: Arc<dyn Runnable> = task.clone();
        if !worker.ask_to_perform_task(Arc::clone(&task)) {
            pending.push(task);
        }
    }
    for task in pending {
        worker.tell_to_perform_task(task).expect("worker accepts tasks");
    }
}

fn exercise(worker: &dyn Worker, count: usize) {
    let executions = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<_> = (0..count)
        .map(|i| {
            Multiply {
                value: i as f64,
                factor: 1.5,
            }
            .into_task(Arc::clone(&executions))
        })
        .collect();

    submit_all(worker, &tasks);
    for task in &tasks {
        task.wait_until_complete();
    }

    assert_eq!(executions.load(Ordering::SeqCst), count);
    assert_eq!(worker.number_of_tasks_completed(), count);
    for (i, task) in tasks.iter().enumerate() {
        assert_eq!(task.take_output().unwrap(), i as f64 * 1.5);
    }
    let per_thread = worker.tasks_completed_per_thread();
    assert_eq!(per_thread.len(), worker.number_of_worker_threads());
    assert_eq!(per_thread.iter().sum::<usize>(), count);
}

#[test]
fn synchronous_worker_loses_no_tasks() {
    for count in [1, 10, 500] {
        let worker = SynchronousWorker::new();
        exercise(&worker, count);
    }
}

#[test]
fn fixed_pool_loses_no_tasks() {
    for threads in [1, 2, 8] {
        for count in [1, 10, 500] {
            let worker = FixedPoolWorker::new(threads).unwrap();
            assert_eq!(worker.number_of_worker_threads(), threads);
            exercise(&worker, count);
        }
    }
}

#[test]
fn queued_pool_loses_no_tasks() {
    for threads in [1, 2, 8] {
        for count in [1, 10, 500] {
            // A small queue forces both refused asks and blocking tells.
            let worker = QueuedPoolWorker::with_capacity(threads, 16).unwrap();
            assert_eq!(worker.queue_capacity(), 16);
            exercise(&worker, count);
        }
    }
}

#[test]
fn configured_workers_are_interchangeable() {
    for kind in [WorkerKind::Synchronous, WorkerKind::Pool, WorkerKind::Queued] {
        let worker = WorkerConfig {
            kind,
            threads: 3,
            queue_capacity: 100,
        }
        .spawn()
        .unwrap();
        exercise(worker.as_ref(), 50);
        let summary = worker.summary_of_work_so_far();
        assert!(summary.starts_with("Tasks carried out by"));
    }
}

#[test]
fn tasks_submitted_from_many_threads_all_run() {
    let worker: Arc<dyn Worker> = Arc::new(FixedPoolWorker::new(4).unwrap());
    let executions = Arc::new(AtomicUsize::new(0));
    let submitters: Vec<_> = (0..4)
        .map(|s| {
            let worker = Arc::clone(&worker);
            let executions = Arc::clone(&executions);
            thread::spawn(move || {
                let tasks: Vec<_> = (0..100)
                    .map(|i| {
                        Multiply {
                            value: (s * 100 + i) as f64,
                            factor: 2.0,
                        }
                        .into_task(Arc::clone(&executions))
                    })
                    .collect();
                for task in &tasks {
                    worker.tell_to_perform_task(task.clone()).unwrap();
                }
                for task in &tasks {
                    task.wait_until_complete();
                }
            })
        })
        .collect();
    for submitter in submitters {
        submitter.join().unwrap();
    }
    assert_eq!(worker.number_of_tasks_completed(), 400);
    assert_eq!(executions.load(Ordering::SeqCst), 400);
}

#[test]
fn a_waited_task_is_already_counted() {
    let workers: Vec<Box<dyn Worker>> = vec![
        Box::new(FixedPoolWorker::new(2).unwrap()),
        Box::new(QueuedPoolWorker::new(2).unwrap()),
    ];
    for worker in &workers {
        for round in 1..=2000 {
            let task = Arc::new(Task::new(|| ()));
            worker.tell_to_perform_task(task.clone()).unwrap();
            task.wait_until_complete();
            assert_eq!(worker.number_of_tasks_completed(), round);
        }
    }
}
