// Licensed under the Apache-2.0 license

//! HIL Interface for mailbox FIFO hardware.

use mbox_config::FifoType;
use thiserror::Error;

/// A single mailbox message word.
pub type MboxMsg = u32;

/// Interrupt sources of a mailbox channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MailboxIrq {
    /// The transmit FIFO has room again.
    Tx,
    /// The receive FIFO holds at least one message.
    Rx,
}

/// Failures reported by the hardware primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HwError {
    #[error("clock {0:?} could not be enabled")]
    ClockUnavailable(String),
    #[error("hardware fault: {0}")]
    Fault(String),
}

/// Mailbox Hardware Interface Layer (HIL).
///
/// One implementation exists per hardware generation. An implementation owns
/// whatever private register state it needs; the framework only ever reaches
/// the hardware through these primitives.
pub trait MailboxOps: Send + Sync {
    /// Returns the hardware generation, which decides how many messages the
    /// receive path may read per interrupt.
    fn hw_type(&self) -> FifoType;

    /// Powers up the channel: enables its clock and arms the receive interrupt.
    ///
    /// # Returns
    ///
    /// * `Ok(())` on success.
    /// * `Err(HwError)` if the channel cannot be brought up.
    fn startup(&self) -> Result<(), HwError>;

    /// Disarms interrupts and may gate the clock.
    fn shutdown(&self);

    /// Reads the oldest message from the receive FIFO.
    fn fifo_read(&self) -> MboxMsg;

    /// Writes a message into the transmit FIFO.
    fn fifo_write(&self, msg: MboxMsg);

    /// Returns true if the receive FIFO holds no message.
    fn fifo_empty(&self) -> bool;

    /// Returns true if the transmit FIFO cannot accept another message.
    fn fifo_full(&self) -> bool;

    fn enable_irq(&self, irq: MailboxIrq);

    fn disable_irq(&self, irq: MailboxIrq);

    fn ack_irq(&self, irq: MailboxIrq);

    /// Returns true if `irq` is both enabled and pending.
    fn is_irq(&self, irq: MailboxIrq) -> bool;

    /// Saves the register context before the power domain goes down.
    fn save_ctx(&self) {}

    /// Restores the context captured by [`MailboxOps::save_ctx`].
    fn restore_ctx(&self) {}
}
