// Licensed under the Apache-2.0 license

use crate::lock;
use gpio_davinci::{IrqDispatch, ParentIrqChip};
use log::warn;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

type Handler = Arc<dyn Fn(u32) + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AintcEvent {
    Mask(u32),
    Unmask(u32),
    Ack(u32),
    Dispatch(u32),
}

/// Emulated top-level interrupt controller.
///
/// Lines raised while masked are latched and delivered by
/// [`Aintc::replay_pending`].
#[derive(Default)]
pub struct Aintc {
    handlers: Mutex<BTreeMap<u32, Handler>>,
    masked: Mutex<BTreeSet<u32>>,
    pending: Mutex<BTreeSet<u32>>,
    events: Mutex<Vec<AintcEvent>>,
}

impl Aintc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler(&self, irq: u32, handler: impl Fn(u32) + Send + Sync + 'static) {
        lock(&self.handlers).insert(irq, Arc::new(handler));
    }

    /// Signals line `irq`. Returns false if the line is masked.
    pub fn raise(&self, irq: u32) -> bool {
        if lock(&self.masked).contains(&irq) {
            lock(&self.pending).insert(irq);
            return false;
        }
        self.handle_irq(irq);
        true
    }

    /// Delivers the lines latched while masked that are now unmasked.
    pub fn replay_pending(&self) -> usize {
        let ready: Vec<u32> = {
            let masked = lock(&self.masked);
            let mut pending = lock(&self.pending);
            let ready = pending.difference(&masked).copied().collect::<Vec<_>>();
            for irq in &ready {
                pending.remove(irq);
            }
            ready
        };
        for irq in &ready {
            self.handle_irq(*irq);
        }
        ready.len()
    }

    pub fn is_masked(&self, irq: u32) -> bool {
        lock(&self.masked).contains(&irq)
    }

    pub fn events(&self) -> Vec<AintcEvent> {
        lock(&self.events).clone()
    }

    /// Dispatched lines in order, excluding `skip`.
    pub fn dispatched_except(&self, skip: &[u32]) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AintcEvent::Dispatch(irq) if !skip.contains(&irq) => Some(irq),
                _ => None,
            })
            .collect()
    }

    fn log(&self, event: AintcEvent) {
        lock(&self.events).push(event);
    }
}

impl ParentIrqChip for Aintc {
    fn mask(&self, irq: u32) {
        lock(&self.masked).insert(irq);
        self.log(AintcEvent::Mask(irq));
    }

    fn unmask(&self, irq: u32) {
        lock(&self.masked).remove(&irq);
        self.log(AintcEvent::Unmask(irq));
    }

    fn ack(&self, irq: u32) {
        self.log(AintcEvent::Ack(irq));
    }
}

impl IrqDispatch for Aintc {
    fn handle_irq(&self, irq: u32) {
        self.log(AintcEvent::Dispatch(irq));
        let handler = lock(&self.handlers).get(&irq).cloned();
        match handler {
            Some(handler) => handler(irq),
            None => warn!("AINTC: no handler for irq {}", irq),
        }
    }
}
