// Licensed under the Apache-2.0 license

use crate::chip::GpioController;
use crate::irq::{IrqDispatch, ParentIrqChip};
use crate::regs::GpioReg;
use std::sync::Arc;

/// Chained handler for one 16-pin bank line.
///
/// Two banks share the status register of their controller; `mask` selects
/// this bank's half.
pub struct BankHandler {
    controller: Arc<GpioController>,
    bank_irq: u32,
    mask: u32,
    first_irq: u32,
}

impl BankHandler {
    /// `upper` selects pins 16..31 of `controller`. `first_irq` is the logical
    /// interrupt of the bank's first pin.
    pub fn new(controller: Arc<GpioController>, bank_irq: u32, upper: bool, first_irq: u32) -> Self {
        Self {
            controller,
            bank_irq,
            mask: if upper { 0xffff_0000 } else { 0x0000_ffff },
            first_irq,
        }
    }

    pub fn bank_irq(&self) -> u32 {
        self.bank_irq
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn first_irq(&self) -> u32 {
        self.first_irq
    }

    pub fn controller(&self) -> &Arc<GpioController> {
        &self.controller
    }

    /// Demuxes the bank line into per-pin interrupts.
    ///
    /// The parent line stays masked for the whole scan. Each pass acks the
    /// bits it saw with a single status write and dispatches them lowest bit
    /// first; passes repeat until no bit of this bank is left. Returns the
    /// number of interrupts dispatched.
    pub fn handle(&self, parent: &dyn ParentIrqChip, dispatch: &dyn IrqDispatch) -> usize {
        let regs = self.controller.regs();
        let shift = self.mask.trailing_zeros();
        let mut dispatched = 0;

        parent.mask(self.bank_irq);
        parent.ack(self.bank_irq);
        loop {
            let status = regs.read(GpioReg::IntStat) & self.mask;
            if status == 0 {
                break;
            }
            regs.write(GpioReg::IntStat, status);

            let mut pending = status >> shift;
            while pending != 0 {
                dispatch.handle_irq(self.first_irq + pending.trailing_zeros());
                dispatched += 1;
                pending &= pending - 1;
            }
        }
        parent.unmask(self.bank_irq);
        dispatched
    }
}

impl core::fmt::Debug for BankHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BankHandler")
            .field("bank_irq", &self.bank_irq)
            .field("mask", &format_args!("{:#010x}", self.mask))
            .field("first_irq", &self.first_irq)
            .finish()
    }
}
