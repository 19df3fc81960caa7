use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

/// A unit of work submitted to the pool.
pub type Task = Box<dyn FnOnce() + Send>;

/// Thread-safe, closable queue of tasks feeding the worker pool.
///
/// Once closed, pushes are dropped and pops return `None` immediately,
/// releasing any blocked worker. Tasks still queued at close time are
/// abandoned.
pub struct TaskQueue {
    sender: Mutex<Option<Sender<Task>>>,
    receiver: Receiver<Task>,
    closed: AtomicBool,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();

        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            closed: AtomicBool::new(false),
        }
    }

    /// Queue a task. Returns `false` if the queue is closed and the task was
    /// dropped.
    pub fn push(&self, task: Task) -> bool {
        match &*self.sender.lock() {
            Some(sender) => sender.send(task).is_ok(),
            None => false,
        }
    }

    /// Block until a task is available or the queue is closed.
    pub fn pop(&self) -> Option<Task> {
        if self.is_closed() {
            return None;
        }

        match self.receiver.recv() {
            Ok(task) if !self.is_closed() => Some(task),
            _ => None,
        }
    }

    /// Take a task without blocking.
    pub fn try_pop(&self) -> Option<Task> {
        if self.is_closed() {
            return None;
        }

        self.receiver.try_recv().ok()
    }

    /// Close the queue, waking every blocked [`TaskQueue::pop`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.sender.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
