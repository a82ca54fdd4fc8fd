// Licensed under the Apache-2.0 license

use crate::deferred::DeferredTask;
use crate::error::MailboxError;
use crate::hil::MboxMsg;
use crate::lock;
use crate::ring::MsgRing;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Snapshot of one queue's counters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Messages accepted into the ring.
    pub queued: u64,
    /// Messages taken out of the ring.
    pub delivered: u64,
    /// Messages refused because the ring was full.
    pub rejected: u64,
    pub len: usize,
    pub capacity: usize,
}

/// One direction of a mailbox: a bounded ring plus the deferred task that
/// moves its messages to or from the hardware.
///
/// The lock only covers ring slot operations; it is never held across a
/// hardware access or while the task is being scheduled.
pub struct MailboxQueue {
    ring: Mutex<MsgRing<MboxMsg>>,
    task: DeferredTask,
    queued: AtomicU64,
    delivered: AtomicU64,
    rejected: AtomicU64,
}

impl MailboxQueue {
    /// Fails with `InvalidQueueCapacity` (named after the task) for a zero
    /// capacity.
    pub fn new(capacity: usize, task: DeferredTask) -> Result<Self, MailboxError> {
        match MsgRing::with_capacity(capacity) {
            Some(ring) => Ok(Self::with_ring(ring, task)),
            None => Err(MailboxError::InvalidQueueCapacity(task.name().to_string())),
        }
    }

    pub(crate) fn with_ring(ring: MsgRing<MboxMsg>, task: DeferredTask) -> Self {
        Self {
            ring: Mutex::new(ring),
            task,
            queued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Adds `msg` and arms the queue's task when the queue was empty.
    pub fn enqueue(&self, msg: MboxMsg) -> Result<(), MailboxError> {
        if self.push_inner(msg)? {
            self.task.schedule();
        }
        Ok(())
    }

    /// Adds `msg` without touching the task. Used by the task itself.
    pub fn push(&self, msg: MboxMsg) -> Result<(), MailboxError> {
        self.push_inner(msg).map(|_| ())
    }

    // Returns whether the ring was empty before the push.
    fn push_inner(&self, msg: MboxMsg) -> Result<bool, MailboxError> {
        let was_empty = {
            let mut ring = lock(&self.ring);
            let was_empty = ring.is_empty();
            if let Err(e) = ring.push(msg) {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
            was_empty
        };
        self.queued.fetch_add(1, Ordering::Relaxed);
        Ok(was_empty)
    }

    pub fn dequeue(&self) -> Result<MboxMsg, MailboxError> {
        let msg = lock(&self.ring).pop()?;
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(msg)
    }

    /// Drops every buffered message.
    pub fn clear(&self) -> usize {
        let mut ring = lock(&self.ring);
        let dropped = ring.len();
        ring.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        lock(&self.ring).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.ring).is_empty()
    }

    pub fn is_full(&self) -> bool {
        lock(&self.ring).is_full()
    }

    pub fn capacity(&self) -> usize {
        lock(&self.ring).capacity()
    }

    pub fn task(&self) -> &DeferredTask {
        &self.task
    }

    pub fn stats(&self) -> QueueStats {
        let (len, capacity) = {
            let ring = lock(&self.ring);
            (ring.len(), ring.capacity())
        };
        QueueStats {
            queued: self.queued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            len,
            capacity,
        }
    }
}
