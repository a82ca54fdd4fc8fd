// Licensed under the Apache-2.0 license

use crate::hil::MboxMsg;
use crate::lock;
use crate::mailbox::Mailbox;
use std::sync::{Arc, Mutex, Weak};

/// Receives messages drained from a mailbox.
///
/// Called from the soft deferred context: implementations must not block.
pub trait MailboxObserver: Send + Sync {
    fn on_message(&self, mbox: &Mailbox, msg: MboxMsg);
}

impl<F> MailboxObserver for F
where
    F: Fn(&Mailbox, MboxMsg) + Send + Sync,
{
    fn on_message(&self, mbox: &Mailbox, msg: MboxMsg) {
        self(mbox, msg)
    }
}

/// List of observers. Only weak references are kept; the caller that
/// registered an observer owns it.
#[derive(Default)]
pub struct Notifier {
    observers: Mutex<Vec<Weak<dyn MailboxObserver>>>,
}

fn same_observer(entry: &Weak<dyn MailboxObserver>, observer: &Arc<dyn MailboxObserver>) -> bool {
    Weak::as_ptr(entry) as *const () == Arc::as_ptr(observer) as *const ()
}

impl Notifier {
    pub fn register(&self, observer: &Arc<dyn MailboxObserver>) {
        lock(&self.observers).push(Arc::downgrade(observer));
    }

    /// Removes one registration of `observer`. Returns false if it was not
    /// registered.
    pub fn unregister(&self, observer: &Arc<dyn MailboxObserver>) -> bool {
        let mut observers = lock(&self.observers);
        match observers.iter().position(|w| same_observer(w, observer)) {
            Some(index) => {
                observers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Calls every live observer with `msg` and returns how many were called.
    ///
    /// Observers are invoked outside the list lock, so an observer may
    /// register or unregister others.
    pub fn notify(&self, mbox: &Mailbox, msg: MboxMsg) -> usize {
        let live: Vec<Arc<dyn MailboxObserver>> = {
            let mut observers = lock(&self.observers);
            observers.retain(|w| w.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in &live {
            observer.on_message(mbox, msg);
        }
        live.len()
    }

    /// Number of registrations, including ones whose observer has been dropped.
    pub fn len(&self) -> usize {
        lock(&self.observers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
