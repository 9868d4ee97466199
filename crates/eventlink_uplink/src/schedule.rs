//! Timer-driven task scheduling.
//!
//! Periodic work is posted as [`Task`]s from timer threads to a channel the
//! main loop drains, so all event log access happens on threads the
//! application controls.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Work the main loop is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Run one delivery cycle.
    DeliverEvents,
    /// Synchronize the device clock.
    SyncClock,
}

/// Posts tasks from timer threads and hands them to the main loop.
///
/// Timer threads stop on their next tick once the scheduler is dropped.
#[derive(Debug)]
pub struct Scheduler {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    timers: Vec<JoinHandle<()>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates a scheduler with no timers.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            timers: Vec::new(),
        }
    }

    /// Posts `task` every time `delay` elapses.
    ///
    /// `delay` is called again before each wait, so it can add jitter.
    pub fn every<F>(&mut self, task: Task, delay: F)
    where
        F: Fn() -> Duration + Send + 'static,
    {
        let sender = self.sender.clone();
        let handle = thread::spawn(move || loop {
            thread::sleep(delay());
            if sender.send(task).is_err() {
                debug!(?task, "scheduler gone, timer stopped");
                break;
            }
        });
        self.timers.push(handle);
    }

    /// Posts `task` immediately.
    pub fn post(&self, task: Task) {
        // the receiver lives in `self`, so this cannot fail
        let _ = self.sender.send(task);
    }

    /// Waits for the next task.
    pub fn next(&self) -> Option<Task> {
        self.receiver.recv().ok()
    }

    /// Waits up to `timeout` for the next task.
    pub fn next_timeout(&self, timeout: Duration) -> Option<Task> {
        match self.receiver.recv_timeout(timeout) {
            Ok(task) => Some(task),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of timer threads started.
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn posted_tasks_arrive_in_order() {
        let scheduler = Scheduler::new();
        scheduler.post(Task::SyncClock);
        scheduler.post(Task::DeliverEvents);
        assert_eq!(scheduler.next(), Some(Task::SyncClock));
        assert_eq!(scheduler.next(), Some(Task::DeliverEvents));
        assert_eq!(scheduler.next_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn timers_post_repeatedly() {
        let mut scheduler = Scheduler::new();
        scheduler.every(Task::DeliverEvents, || Duration::from_millis(1));
        assert_eq!(scheduler.timer_count(), 1);

        for _ in 0..3 {
            assert_eq!(
                scheduler.next_timeout(Duration::from_secs(5)),
                Some(Task::DeliverEvents)
            );
        }
    }

    #[test]
    fn delay_is_reevaluated_each_tick() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        let counter = Arc::clone(&calls);
        scheduler.every(Task::SyncClock, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Duration::from_millis(1)
        });
        scheduler.next_timeout(Duration::from_secs(5)).unwrap();
        scheduler.next_timeout(Duration::from_secs(5)).unwrap();
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }
}
