//! ActionQueue: deferred mutations applied one at a time, in submission order, on the draining thread.
//!
//! Producers on any thread hold an [`ActionSender`] and enqueue closures. The owner calls
//! [`ActionQueue::drain`] from its own loop; actions queued while draining (by another thread or by
//! a running action) go to the back of the line and run later in the same drain.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::trace;

/// A target that can stop accepting mutations for good (e.g. a finished game).
pub trait Finalize {
    fn is_finalized(&self) -> bool {
        false
    }
}

pub type Action<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Cloneable, `Send` handle for submitting actions.
pub struct ActionSender<T> {
    tx: Sender<Action<T>>,
}

impl<T> Clone for ActionSender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> std::fmt::Debug for ActionSender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSender").field("pending", &self.tx.len()).finish()
    }
}

impl<T> ActionSender<T> {
    /// Append an action. False if the queue no longer exists.
    pub fn enqueue<F>(&self, action: F) -> bool
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.tx.send(Box::new(action)).is_ok()
    }
}

/// Result of one [`ActionQueue::drain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    pub executed: usize,
    /// Discarded because the target was finalized.
    pub dropped: usize,
}

/// Single-consumer FIFO of deferred actions against a `T`.
pub struct ActionQueue<T> {
    tx: Sender<Action<T>>,
    rx: Receiver<Action<T>>,
}

impl<T> std::fmt::Debug for ActionQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionQueue").field("pending", &self.rx.len()).finish()
    }
}

impl<T: Finalize> Default for ActionQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Finalize> ActionQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> ActionSender<T> {
        ActionSender { tx: self.tx.clone() }
    }

    pub fn enqueue<F>(&self, action: F)
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        // never fails: we hold the receiver
        let _ = self.tx.send(Box::new(action));
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Run every queued action against `target`, oldest first, until the queue is empty.
    /// Never waits for new work. Once `target` is finalized the rest are dropped unrun.
    pub fn drain(&mut self, target: &mut T) -> DrainReport {
        let mut report = DrainReport::default();
        loop {
            match self.rx.try_recv() {
                Ok(action) => {
                    if target.is_finalized() {
                        report.dropped += 1;
                        continue;
                    }
                    action(target);
                    report.executed += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        if report.executed + report.dropped > 0 {
            trace!(executed = report.executed, dropped = report.dropped, "action queue drained");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    #[derive(Debug, Default)]
    struct Log {
        entries: Vec<&'static str>,
        closed: bool,
    }

    impl Finalize for Log {
        fn is_finalized(&self) -> bool {
            self.closed
        }
    }

    #[test]
    fn test_drain_runs_in_submission_order() {
        let mut queue = ActionQueue::new();
        let mut log = Log::default();
        queue.enqueue(|l: &mut Log| l.entries.push("a"));
        queue.enqueue(|l: &mut Log| l.entries.push("b"));
        queue.enqueue(|l: &mut Log| l.entries.push("c"));
        assert_eq!(queue.len(), 3);
        let report = queue.drain(&mut log);
        assert_eq!(report, DrainReport { executed: 3, dropped: 0 });
        assert_eq!(log.entries, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_actions_enqueued_while_draining_are_appended() {
        let mut queue = ActionQueue::new();
        let sender = queue.sender();
        let mut log = Log::default();
        queue.enqueue(move |l: &mut Log| {
            l.entries.push("first");
            sender.enqueue(|l: &mut Log| l.entries.push("nested"));
        });
        queue.enqueue(|l: &mut Log| l.entries.push("second"));
        queue.drain(&mut log);
        assert_eq!(log.entries, vec!["first", "second", "nested"]);
    }

    #[test]
    fn test_finalized_target_drops_remaining_actions() {
        let mut queue = ActionQueue::new();
        let mut log = Log::default();
        queue.enqueue(|l: &mut Log| l.entries.push("before"));
        queue.enqueue(|l: &mut Log| l.closed = true);
        queue.enqueue(|l: &mut Log| l.entries.push("after"));
        queue.enqueue(|l: &mut Log| l.entries.push("later"));
        let report = queue.drain(&mut log);
        assert_eq!(report, DrainReport { executed: 2, dropped: 2 });
        assert_eq!(log.entries, vec!["before"]);
    }

    #[test]
    fn test_senders_from_other_threads() {
        let mut queue = ActionQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sender = queue.sender();
                thread::spawn(move || {
                    for _ in 0..25 {
                        assert!(sender.enqueue(|l: &mut Log| l.entries.push("x")));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut log = Log::default();
        assert_eq!(queue.drain(&mut log).executed, 100);
        assert_eq!(log.entries.len(), 100);
    }

    #[test]
    fn test_enqueue_after_queue_dropped() {
        let queue: ActionQueue<Log> = ActionQueue::new();
        let sender = queue.sender();
        drop(queue);
        assert!(!sender.enqueue(|l: &mut Log| l.entries.push("lost")));
    }
}
