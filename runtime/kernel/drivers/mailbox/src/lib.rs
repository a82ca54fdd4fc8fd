// Licensed under the Apache-2.0 license

//! Generic mailbox framework.
//!
//! Independent processor cores exchange single-word messages through a
//! hardware FIFO and an interrupt line. Each [`Mailbox`] owns a transmit and a
//! receive [`MailboxQueue`]; the interrupt top half only schedules deferred
//! work, receive draining runs in the soft context and transmit retries run in
//! the worker context of the [`DeferredRuntime`].

mod deferred;
mod error;
pub mod hil;
mod mailbox;
#[cfg(test)]
mod mock;
mod notifier;
mod queue;
mod registry;
mod ring;

pub use deferred::{DeferredRuntime, DeferredTask, TaskContext};
pub use error::MailboxError;
pub use hil::{HwError, MailboxIrq, MailboxOps, MboxMsg};
pub use mailbox::{Mailbox, MailboxStats};
pub use notifier::{MailboxObserver, Notifier};
pub use queue::{MailboxQueue, QueueStats};
pub use registry::{MailboxDesc, MailboxRegistry};
pub use ring::MsgRing;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// Lock poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(rwlock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rwlock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(rwlock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rwlock.write().unwrap_or_else(PoisonError::into_inner)
}
