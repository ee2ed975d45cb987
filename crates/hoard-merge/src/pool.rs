//! Fixed-size worker pool and a counted error group.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed number of OS threads fed from one shared queue.
///
/// Dropping the pool closes the queue and joins every worker after the
/// queued jobs have run.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = channel::unbounded::<Job>();
        let workers = (0..size)
            .filter_map(|index| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("hoard-worker-{index}"))
                    .spawn(move || work(receiver))
                    .map_err(|err| tracing::error!(error = %err, "failed to spawn worker"))
                    .ok()
            })
            .collect();
        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// One worker per available CPU.
    pub fn with_available_parallelism() -> Self {
        Self::new(thread::available_parallelism().map_or(1, |n| n.get()))
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job. If the pool has no workers the job runs on the calling
    /// thread.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job: Job = Box::new(job);
        let job = match &self.sender {
            Some(sender) if !self.workers.is_empty() => match sender.send(job) {
                Ok(()) => return,
                Err(channel::SendError(job)) => job,
            },
            _ => job,
        };
        job();
    }
}

fn work(receiver: Receiver<Job>) {
    for job in receiver.iter() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!("worker job panicked");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

enum Report<T, E> {
    Done(Result<T, E>),
    Dropped,
}

/// Waits for a counted set of units, each reporting a value or an error.
///
/// Every [`ErrorGroup::add`] hands out one [`Completion`]. A completion that
/// is dropped without [`Completion::done`] being called is counted as
/// abandoned.
pub struct ErrorGroup<T, E> {
    sender: Sender<Report<T, E>>,
    receiver: Receiver<Report<T, E>>,
    pending: usize,
}

/// Handle through which one unit reports its result.
pub struct Completion<T, E> {
    sender: Option<Sender<Report<T, E>>>,
}

/// Everything reported to an [`ErrorGroup`].
#[derive(Debug)]
pub struct GroupOutcome<T, E> {
    pub values: Vec<T>,
    pub errors: Vec<E>,
    pub abandoned: usize,
}

impl<T, E> ErrorGroup<T, E> {
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            sender,
            receiver,
            pending: 0,
        }
    }

    pub fn add(&mut self) -> Completion<T, E> {
        self.pending += 1;
        Completion {
            sender: Some(self.sender.clone()),
        }
    }

    /// Block until every unit has reported or been dropped.
    pub fn wait(self) -> GroupOutcome<T, E> {
        let ErrorGroup {
            sender,
            receiver,
            pending,
        } = self;
        drop(sender);
        let mut outcome = GroupOutcome {
            values: Vec::new(),
            errors: Vec::new(),
            abandoned: 0,
        };
        for _ in 0..pending {
            match receiver.recv() {
                Ok(Report::Done(Ok(value))) => outcome.values.push(value),
                Ok(Report::Done(Err(err))) => outcome.errors.push(err),
                Ok(Report::Dropped) => outcome.abandoned += 1,
                Err(_) => {
                    outcome.abandoned = pending - outcome.values.len() - outcome.errors.len();
                    break;
                }
            }
        }
        outcome
    }
}

impl<T, E> Default for ErrorGroup<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Completion<T, E> {
    pub fn done(mut self, result: Result<T, E>) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Report::Done(result));
        }
    }
}

impl<T, E> Drop for Completion<T, E> {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Report::Dropped);
        }
    }
}
