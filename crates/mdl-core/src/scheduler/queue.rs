//! Bounded, closable FIFO of pending jobs shared by all workers.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::job::Job;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("job queue is full")]
    Full,
    #[error("job queue is closed")]
    Closed,
}

#[derive(Debug)]
struct State {
    jobs: VecDeque<Job>,
    closed: bool,
}

/// Job queue with fixed capacity. Producers never block (a full queue is an
/// error); consumers block in [`JobQueue::pop`] until a job arrives or the
/// queue is closed and drained.
#[derive(Debug)]
pub struct JobQueue {
    capacity: usize,
    state: Mutex<State>,
    available: Condvar,
}

impl JobQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(State {
                jobs: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn push(&self, job: Job) -> Result<(), QueueError> {
        let mut state = self.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }
        if state.jobs.len() >= self.capacity {
            return Err(QueueError::Full);
        }
        state.jobs.push_back(job);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Closes the queue. Returns `true` for the call that actually closed it.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        let first = !state.closed;
        state.closed = true;
        drop(state);
        self.available.notify_all();
        first
    }

    /// Next job in FIFO order; blocks while the queue is open and empty.
    /// Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<Job> {
        let mut state = self.lock();
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            if state.closed {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Closes the queue early and removes every job not yet taken by a worker.
    pub fn cancel(&self) -> Vec<Job> {
        let mut state = self.lock();
        state.closed = true;
        let drained: Vec<Job> = state.jobs.drain(..).collect();
        drop(state);
        self.available.notify_all();
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobSpec, UNKNOWN_SIZE};
    use std::sync::Arc;
    use std::time::Duration;

    fn job(i: usize) -> Job {
        Job::from_spec(JobSpec::parse(&format!("https://h/{i}.bin")), i, UNKNOWN_SIZE)
    }

    #[test]
    fn fifo_then_none_after_close() {
        let q = JobQueue::with_capacity(3);
        for i in 0..3 {
            q.push(job(i)).unwrap();
        }
        assert_eq!(q.push(job(3)), Err(QueueError::Full));
        assert!(q.close());
        assert!(!q.close(), "second close is a no-op");
        assert_eq!(q.push(job(4)), Err(QueueError::Closed));
        assert_eq!(q.pop().unwrap().index, 0);
        assert_eq!(q.pop().unwrap().index, 1);
        assert_eq!(q.pop().unwrap().index, 2);
        assert!(q.pop().is_none());
    }

    #[test]
    fn pop_blocks_until_close() {
        let q = Arc::new(JobQueue::with_capacity(1));
        let consumer = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || q.pop())
        };
        std::thread::sleep(Duration::from_millis(50));
        assert!(!consumer.is_finished(), "empty open queue must block");
        q.close();
        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn cancel_drains_pending() {
        let q = JobQueue::with_capacity(4);
        for i in 0..4 {
            q.push(job(i)).unwrap();
        }
        assert_eq!(q.pop().unwrap().index, 0);
        let drained = q.cancel();
        assert_eq!(drained.iter().map(|j| j.index).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(q.is_closed());
        assert!(q.is_empty());
        assert!(q.pop().is_none());
    }
}
