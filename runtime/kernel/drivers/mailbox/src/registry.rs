// Licensed under the Apache-2.0 license

use crate::deferred::DeferredRuntime;
use crate::error::MailboxError;
use crate::hil::MailboxOps;
use crate::mailbox::Mailbox;
use crate::notifier::MailboxObserver;
use crate::{lock, read, write};
use log::{debug, info, warn};
use mbox_config::{EndpointConfig, MailboxConfig, DEFAULT_QUEUE_CAPACITY};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Everything needed to create one endpoint.
pub struct MailboxDesc {
    pub name: String,
    pub irq: u32,
    pub ops: Box<dyn MailboxOps>,
    pub queue_capacity: usize,
}

impl MailboxDesc {
    pub fn new(name: &str, irq: u32, ops: Box<dyn MailboxOps>) -> Self {
        Self {
            name: name.to_string(),
            irq,
            ops,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn from_config(
        config: &MailboxConfig,
        endpoint: &EndpointConfig,
        ops: Box<dyn MailboxOps>,
    ) -> Self {
        Self::new(&endpoint.name, endpoint.irq, ops)
            .with_queue_capacity(config.capacity_for(endpoint))
    }
}

/// Owns every registered endpoint and the deferred runtime their queues run on.
///
/// Endpoints are indexed by controller id, the order in which they were
/// registered.
pub struct MailboxRegistry {
    mailboxes: RwLock<Vec<Arc<Mailbox>>>,
    owner: Mutex<Option<String>>,
    runtime: DeferredRuntime,
}

impl Default for MailboxRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MailboxRegistry {
    pub fn new() -> Self {
        Self {
            mailboxes: RwLock::new(Vec::new()),
            owner: Mutex::new(None),
            runtime: DeferredRuntime::new(),
        }
    }

    /// Registers all endpoints of a device.
    ///
    /// Stops at the first invalid descriptor and returns its error. Endpoints
    /// registered before it stay registered.
    /// The registry keeps the owner of its first successful registration.
    pub fn register(&self, owner: &str, descs: Vec<MailboxDesc>) -> Result<(), MailboxError> {
        let mut mailboxes = write(&self.mailboxes);
        for desc in descs {
            if mailboxes.iter().any(|m| m.name() == desc.name) {
                return Err(MailboxError::AlreadyRegistered(desc.name));
            }
            debug!(
                "Registering mailbox {} (irq {}, id {}) for {}",
                desc.name,
                desc.irq,
                mailboxes.len(),
                owner
            );
            mailboxes.push(Mailbox::new(desc, &self.runtime)?);
            lock(&self.owner).get_or_insert_with(|| owner.to_string());
        }
        info!("{} mailboxes registered for {}", mailboxes.len(), owner);
        Ok(())
    }

    /// Removes every endpoint. Handles already given out stay usable but can
    /// no longer be looked up. Returns how many endpoints were removed.
    pub fn unregister(&self) -> usize {
        let removed: Vec<Arc<Mailbox>> = write(&self.mailboxes).drain(..).collect();
        for mbox in removed.iter().filter(|m| m.use_count() > 0) {
            warn!(
                "Mailbox {} unregistered with {} users",
                mbox.name(),
                mbox.use_count()
            );
        }
        if let Some(owner) = lock(&self.owner).take() {
            info!("{} mailboxes unregistered for {}", removed.len(), owner);
        }
        removed.len()
    }

    /// Looks up `name`, takes a reference on it and subscribes `observer`.
    pub fn get(
        &self,
        name: &str,
        observer: &Arc<dyn MailboxObserver>,
    ) -> Result<Arc<Mailbox>, MailboxError> {
        let mbox = self
            .find(name)
            .ok_or_else(|| MailboxError::NotFound(name.to_string()))?;
        mbox.acquire(observer)?;
        Ok(mbox)
    }

    /// Unsubscribes `observer` and drops the reference taken by [`Self::get`].
    pub fn put(&self, mbox: &Mailbox, observer: &Arc<dyn MailboxObserver>) {
        mbox.release(observer);
    }

    /// Looks up `name` without taking a reference.
    pub fn find(&self, name: &str) -> Option<Arc<Mailbox>> {
        read(&self.mailboxes)
            .iter()
            .find(|m| m.name() == name)
            .cloned()
    }

    pub fn by_id(&self, id: usize) -> Option<Arc<Mailbox>> {
        read(&self.mailboxes).get(id).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        read(&self.mailboxes)
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        read(&self.mailboxes).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn owner(&self) -> Option<String> {
        lock(&self.owner).clone()
    }

    /// Delivers hardware interrupt `line` to every live endpoint wired to it.
    /// Returns true if any endpoint had a pending interrupt.
    pub fn dispatch_irq(&self, line: u32) -> bool {
        let targets: Vec<Arc<Mailbox>> = read(&self.mailboxes)
            .iter()
            .filter(|m| m.irq() == line && m.is_live())
            .cloned()
            .collect();
        let mut handled = false;
        for mbox in targets {
            handled |= mbox.handle_interrupt();
        }
        handled
    }

    /// Saves the context of every live endpoint ahead of system suspend.
    pub fn save_all_contexts(&self) {
        for mbox in self.live() {
            mbox.save_context();
        }
    }

    /// Restores the context of every live endpoint after resume.
    pub fn restore_all_contexts(&self) {
        for mbox in self.live() {
            mbox.restore_context();
        }
    }

    fn live(&self) -> Vec<Arc<Mailbox>> {
        read(&self.mailboxes)
            .iter()
            .filter(|m| m.is_live())
            .cloned()
            .collect()
    }

    pub fn runtime(&self) -> &DeferredRuntime {
        &self.runtime
    }

    /// Waits for all deferred work to finish. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.runtime.wait_idle(timeout)
    }
}
