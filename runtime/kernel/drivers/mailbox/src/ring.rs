// Licensed under the Apache-2.0 license

use crate::error::MailboxError;

/// Bounded circular buffer of fixed-size messages.
///
/// `head` is the next slot to read and `tail` the next slot to write. When
/// they meet, `full` tells a full ring from an empty one.
pub struct MsgRing<T> {
    slots: Box<[T]>,
    head: usize,
    tail: usize,
    full: bool,
}

impl<T: Copy + Default> MsgRing<T> {
    /// Creates a ring holding at most `capacity` messages, or `None` for a
    /// zero capacity.
    pub fn with_capacity(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        Some(MsgRing {
            slots: vec![T::default(); capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            full: false,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        if self.full {
            self.capacity()
        } else if self.tail >= self.head {
            self.tail - self.head
        } else {
            self.capacity() - self.head + self.tail
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Copies `msg` into the next free slot. A full ring is left untouched.
    pub fn push(&mut self, msg: T) -> Result<(), MailboxError> {
        if self.full {
            return Err(MailboxError::QueueFull);
        }
        self.slots[self.tail] = msg;
        self.tail = (self.tail + 1) % self.capacity();
        self.full = self.tail == self.head;
        Ok(())
    }

    /// Copies out the oldest message.
    pub fn pop(&mut self) -> Result<T, MailboxError> {
        if self.is_empty() {
            return Err(MailboxError::QueueEmpty);
        }
        let msg = self.slots[self.head];
        self.head = (self.head + 1) % self.capacity();
        self.full = false;
        Ok(msg)
    }

    pub fn peek(&self) -> Option<T> {
        if self.is_empty() {
            None
        } else {
            Some(self.slots[self.head])
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.full = false;
    }
}
