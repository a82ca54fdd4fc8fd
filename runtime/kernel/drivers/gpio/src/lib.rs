// Licensed under the Apache-2.0 license

//! DaVinci GPIO controller and its interrupt demux.
//!
//! Pins are grouped 32 to a controller. Interrupts reach the top-level chip
//! either directly, one line per pin for the first pins of controller 0
//! (unbanked), or through one line per 16-pin bank that [`BankHandler`]
//! demultiplexes into per-pin interrupts (banked).

mod chip;
mod demux;
mod error;
mod irq;
#[cfg(test)]
mod mock;
mod pin;
pub mod regs;
mod setup;

pub use chip::{GpioController, ToIrqMode};
pub use demux::BankHandler;
pub use error::GpioError;
pub use irq::{ClockError, ClockGate, IrqDispatch, IrqTrigger, ParentIrqChip};
pub use pin::{PinIrq, PinIrqState, UnbankedIrqChip};
pub use regs::{GpioReg, GpioRegs, Mmio};
pub use setup::{GpioSubsystem, IrqMode};

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
