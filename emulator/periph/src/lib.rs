/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the emulated mailbox, interrupt controller,
    GPIO and clock peripherals.

--*/

mod aintc;
mod clock;
mod gpio;
mod mailbox;

pub use aintc::{Aintc, AintcEvent};
pub use clock::EmuClock;
pub use gpio::{EdgeEvent, EmuGpioRegs};
pub use mailbox::{EmuMailboxHw, EmuMailboxOps};

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
