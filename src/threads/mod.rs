//! A generic worker pool over a closable task queue.

pub mod queue;

pub use queue::{Task, TaskQueue};

use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};

use crate::error::{Error, ErrorList};

/// Handle to a task submitted with [`ThreadPool::submit`].
pub struct TaskHandle<R> {
    receiver: Receiver<thread::Result<R>>,
}

impl<R> TaskHandle<R> {
    /// Block until the task finishes. A panicking task surfaces as
    /// [`Error::Async`]; so does a task abandoned by a closing pool.
    pub fn wait(self) -> Result<R, Error> {
        let mut errors = ErrorList::new();

        match self.receiver.recv() {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(payload)) => errors.push_panic(payload.as_ref()),
            Err(_) => errors.push("task abandoned before completion"),
        }

        Err(Error::Async(errors))
    }
}

/// A fixed set of worker threads executing submitted tasks.
///
/// Dropping the pool closes the queue: workers finish their in-flight task
/// and exit, abandoning anything still queued.
pub struct ThreadPool {
    queue: Arc<TaskQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Pool sized to the available parallelism, keeping one core free.
    pub fn new() -> Self {
        let workers = Self::hardware_concurrency();

        let queue = Arc::new(TaskQueue::new());
        let handles = (0..workers)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || Self::worker(&queue))
            })
            .collect();

        Self {
            queue,
            workers: handles,
        }
    }

    /// Pool with an explicit worker count, which must be at least one.
    pub fn with_threads(threads: usize) -> Result<Self, Error> {
        if threads == 0 {
            return Err(Error::InvalidArgument(
                "thread pool requires at least one worker".to_owned(),
            ));
        }

        let queue = Arc::new(TaskQueue::new());
        let handles = (0..threads)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || Self::worker(&queue))
            })
            .collect();

        Ok(Self {
            queue,
            workers: handles,
        })
    }

    /// Worker count for [`ThreadPool::new`]. At least one, even when the
    /// available parallelism is not computable.
    pub fn hardware_concurrency() -> usize {
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(2)
            .max(2)
            - 1
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    pub fn tasks_queued(&self) -> usize {
        self.queue.len()
    }

    /// Submit a task for asynchronous execution.
    ///
    /// Panics inside the task are caught and reported through the returned
    /// handle rather than unwinding a worker.
    pub fn submit<R, F>(&self, task: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (sender, receiver) = bounded(1);

        self.queue.push(Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(task));
            let _ = sender.send(result);
        }));

        TaskHandle { receiver }
    }

    /// Apply `op` to every item, spread across the pool in contiguous
    /// chunks, and block until all of them finish.
    ///
    /// Results come back in input order. If any chunk fails, the failures
    /// are aggregated into a single [`Error::Async`] and the surviving
    /// results are discarded. Must not be called from a worker task of the
    /// same pool.
    pub fn for_each<T, R, F>(&self, items: Vec<T>, op: F) -> Result<Vec<R>, Error>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let item_count = items.len();
        let task_count = self.thread_count().min(item_count);
        let per_task = item_count / task_count;
        let mut remainder = item_count % task_count;

        let op = Arc::new(op);
        let mut items = items.into_iter();
        let mut handles = Vec::with_capacity(task_count);

        for _ in 0..task_count {
            let mut take = per_task;

            if remainder > 0 {
                take += 1;
                remainder -= 1;
            }

            let chunk: Vec<T> = items.by_ref().take(take).collect();
            let op = Arc::clone(&op);

            handles.push(self.submit(move || chunk.into_iter().map(|item| op(item)).collect()));
        }

        let mut errors = ErrorList::new();
        let mut results: Vec<R> = Vec::with_capacity(item_count);

        for handle in handles {
            match handle.wait() {
                Ok(mut chunk) => results.append(&mut chunk),
                Err(Error::Async(failures)) => errors.merge(failures),
                Err(error) => errors.push(error.to_string()),
            }
        }

        errors.into_result()?;

        Ok(results)
    }

    fn worker(queue: &TaskQueue) {
        while let Some(task) = queue.pop() {
            task();
        }
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.queue.close();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
