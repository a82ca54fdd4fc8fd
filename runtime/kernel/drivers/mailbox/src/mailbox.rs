// Licensed under the Apache-2.0 license

use crate::deferred::{DeferredRuntime, TaskContext};
use crate::error::MailboxError;
use crate::hil::{MailboxIrq, MailboxOps, MboxMsg};
use crate::lock;
use crate::notifier::{MailboxObserver, Notifier};
use crate::queue::{MailboxQueue, QueueStats};
use crate::registry::MailboxDesc;
use crate::ring::MsgRing;
use log::{debug, error, info, warn};
use mbox_config::FifoType;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Counters of both directions of an endpoint.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MailboxStats {
    pub tx: QueueStats,
    pub rx: QueueStats,
}

/// One physical mailbox channel.
///
/// The hardware is live (clock on, interrupts armed) exactly while the use
/// count is non-zero.
pub struct Mailbox {
    name: String,
    irq: u32,
    ops: Box<dyn MailboxOps>,
    txq: MailboxQueue,
    rxq: MailboxQueue,
    use_count: Mutex<u32>,
    live: AtomicBool,
    notifier: Notifier,
}

impl Mailbox {
    pub(crate) fn new(
        desc: MailboxDesc,
        runtime: &DeferredRuntime,
    ) -> Result<Arc<Self>, MailboxError> {
        let MailboxDesc {
            name,
            irq,
            ops,
            queue_capacity,
        } = desc;
        let (Some(tx_ring), Some(rx_ring)) = (
            MsgRing::with_capacity(queue_capacity),
            MsgRing::with_capacity(queue_capacity),
        ) else {
            return Err(MailboxError::InvalidQueueCapacity(name));
        };
        Ok(Arc::new_cyclic(|me: &Weak<Mailbox>| {
            let tx_me = me.clone();
            let tx_task = runtime.task(&format!("{}-tx", name), TaskContext::Worker, move || {
                if let Some(mbox) = tx_me.upgrade() {
                    mbox.flush_tx();
                }
            });
            let rx_me = me.clone();
            let rx_task = runtime.task(&format!("{}-rx", name), TaskContext::Soft, move || {
                if let Some(mbox) = rx_me.upgrade() {
                    mbox.drain_rx();
                }
            });
            Mailbox {
                name,
                irq,
                ops,
                txq: MailboxQueue::with_ring(tx_ring, tx_task),
                rxq: MailboxQueue::with_ring(rx_ring, rx_task),
                use_count: Mutex::new(0),
                live: AtomicBool::new(false),
                notifier: Notifier::default(),
            }
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn irq(&self) -> u32 {
        self.irq
    }

    pub fn hw_type(&self) -> FifoType {
        self.ops.hw_type()
    }

    pub fn use_count(&self) -> u32 {
        *lock(&self.use_count)
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub fn observer_count(&self) -> usize {
        self.notifier.len()
    }

    pub fn stats(&self) -> MailboxStats {
        MailboxStats {
            tx: self.txq.stats(),
            rx: self.rxq.stats(),
        }
    }

    /// Takes a reference on the channel, starting the hardware for the first
    /// user, and subscribes `observer` to received messages.
    pub(crate) fn acquire(&self, observer: &Arc<dyn MailboxObserver>) -> Result<(), MailboxError> {
        {
            let mut count = lock(&self.use_count);
            if *count == 0 {
                // Queues start empty on every power-up.
                self.txq.clear();
                self.rxq.clear();
                if let Err(source) = self.ops.startup() {
                    error!("Mailbox {}: startup failed: {}", self.name, source);
                    return Err(MailboxError::Startup {
                        name: self.name.clone(),
                        source,
                    });
                }
                self.live.store(true, Ordering::Release);
                info!("Mailbox {} started", self.name);
            }
            *count += 1;
            debug!("Mailbox {}: use count {}", self.name, *count);
        }
        self.notifier.register(observer);
        Ok(())
    }

    /// Drops `observer` and one reference; the last user shuts the hardware
    /// down.
    pub(crate) fn release(&self, observer: &Arc<dyn MailboxObserver>) {
        if !self.notifier.unregister(observer) {
            warn!("Mailbox {}: releasing an unknown observer", self.name);
        }
        let mut count = lock(&self.use_count);
        match *count {
            0 => warn!("Mailbox {}: release without matching acquire", self.name),
            1 => {
                *count = 0;
                self.live.store(false, Ordering::Release);
                self.ops.shutdown();
                let dropped = self.txq.clear() + self.rxq.clear();
                if dropped > 0 {
                    warn!(
                        "Mailbox {}: {} buffered messages dropped at shutdown",
                        self.name, dropped
                    );
                }
                info!("Mailbox {} shut down", self.name);
            }
            _ => {
                *count -= 1;
                debug!("Mailbox {}: use count {}", self.name, *count);
            }
        }
    }

    /// Queues `msg` for transmission.
    pub fn send(&self, msg: MboxMsg) -> Result<(), MailboxError> {
        self.txq.enqueue(msg)
    }

    pub fn enable_irq(&self, irq: MailboxIrq) {
        self.ops.enable_irq(irq);
    }

    pub fn disable_irq(&self, irq: MailboxIrq) {
        self.ops.disable_irq(irq);
    }

    pub fn save_context(&self) {
        self.ops.save_ctx();
    }

    pub fn restore_context(&self) {
        self.ops.restore_ctx();
    }

    /// Top half of the channel interrupt. Only schedules deferred work.
    ///
    /// Returns true if the channel had a pending interrupt.
    pub fn handle_interrupt(&self) -> bool {
        if !self.is_live() {
            return false;
        }
        let mut handled = false;
        if self.ops.is_irq(MailboxIrq::Tx) {
            self.ops.disable_irq(MailboxIrq::Tx);
            self.ops.ack_irq(MailboxIrq::Tx);
            self.txq.task().schedule();
            handled = true;
        }
        if self.ops.is_irq(MailboxIrq::Rx) {
            self.rxq.task().schedule();
            handled = true;
        }
        handled
    }

    // Soft context: move hardware messages into the receive ring, then hand
    // every buffered message to the observers.
    fn drain_rx(&self) {
        if !self.is_live() {
            debug!("Mailbox {}: receive drain after shutdown ignored", self.name);
            return;
        }
        let single_word = self.ops.hw_type() == FifoType::Fifo1;
        let mut overrun = false;
        while !self.ops.fifo_empty() {
            if self.rxq.is_full() {
                overrun = true;
                break;
            }
            let msg = self.ops.fifo_read();
            if self.rxq.push(msg).is_err() {
                warn!("Mailbox {}: lost message {:#010x}", self.name, msg);
                overrun = true;
                break;
            }
            if single_word {
                break;
            }
        }
        if overrun {
            // Leave the source pending; the next signal resumes the drain.
            warn!(
                "Mailbox {}: receive queue full, hardware FIFO not drained",
                self.name
            );
        } else {
            self.ops.ack_irq(MailboxIrq::Rx);
        }

        while let Ok(msg) = self.rxq.dequeue() {
            if self.notifier.notify(self, msg) == 0 {
                warn!(
                    "Mailbox {}: message {:#010x} had no observer",
                    self.name, msg
                );
            }
        }
    }

    // Worker context: push queued messages into the hardware until it fills
    // up, then wait for the transmit interrupt.
    fn flush_tx(&self) {
        if !self.is_live() {
            debug!("Mailbox {}: transmit flush after shutdown ignored", self.name);
            return;
        }
        while !self.txq.is_empty() {
            if self.ops.fifo_full() {
                debug!("Mailbox {}: hardware FIFO full, waiting for TX", self.name);
                self.ops.enable_irq(MailboxIrq::Tx);
                break;
            }
            match self.txq.dequeue() {
                Ok(msg) => self.ops.fifo_write(msg),
                Err(_) => break,
            }
        }
    }
}

impl core::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mailbox")
            .field("name", &self.name)
            .field("irq", &self.irq)
            .field("use_count", &self.use_count())
            .field("live", &self.is_live())
            .finish()
    }
}
