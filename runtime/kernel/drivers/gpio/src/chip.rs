// Licensed under the Apache-2.0 license

use crate::error::GpioError;
use crate::lock;
use crate::regs::{GpioReg, GpioRegs};
use std::sync::Mutex;

/// How a controller maps pin offsets onto interrupt numbers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ToIrqMode {
    /// Pins interrupt through bank lines demuxed into `irq_base + offset`.
    /// `None` when the SoC routes no banked interrupts for this controller.
    Banked { irq_base: Option<u32> },
    /// The first `gpio_unbanked` pins own a direct line `gpio_irq + offset`.
    Unbanked { gpio_irq: u32, gpio_unbanked: u32 },
}

/// One 32-pin GPIO controller.
pub struct GpioController {
    index: usize,
    base: u32,
    ngpio: u32,
    regs: GpioRegs,
    to_irq: ToIrqMode,
    // Serialises read-modify-write of the direction register.
    lock: Mutex<()>,
}

impl GpioController {
    pub fn new(index: usize, base: u32, ngpio: u32, regs: GpioRegs, to_irq: ToIrqMode) -> Self {
        Self {
            index,
            base,
            ngpio: ngpio.min(32),
            regs,
            to_irq,
            lock: Mutex::new(()),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// First global pin number of this controller.
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn ngpio(&self) -> u32 {
        self.ngpio
    }

    pub fn regs(&self) -> &GpioRegs {
        &self.regs
    }

    pub fn to_irq_mode(&self) -> ToIrqMode {
        self.to_irq
    }

    fn mask(&self, offset: u32) -> Result<u32, GpioError> {
        if offset >= self.ngpio {
            return Err(GpioError::InvalidArgument(format!(
                "offset {} out of range for controller {}",
                offset, self.index
            )));
        }
        Ok(1 << offset)
    }

    fn set_direction(&self, offset: u32, out: bool, value: bool) -> Result<(), GpioError> {
        let mask = self.mask(offset)?;
        let _guard = lock(&self.lock);
        let mut dir = self.regs.read(GpioReg::Dir);
        if out {
            dir &= !mask;
            self.regs.write(
                if value {
                    GpioReg::SetData
                } else {
                    GpioReg::ClrData
                },
                mask,
            );
        } else {
            dir |= mask;
        }
        self.regs.write(GpioReg::Dir, dir);
        Ok(())
    }

    pub fn direction_input(&self, offset: u32) -> Result<(), GpioError> {
        self.set_direction(offset, false, false)
    }

    /// Drives `value` on the pin, then turns it into an output.
    pub fn direction_output(&self, offset: u32, value: bool) -> Result<(), GpioError> {
        self.set_direction(offset, true, value)
    }

    pub fn is_input(&self, offset: u32) -> Result<bool, GpioError> {
        let mask = self.mask(offset)?;
        Ok(self.regs.read(GpioReg::Dir) & mask != 0)
    }

    /// Reads the pin level. Works for outputs as well; a value written just
    /// before may not be visible yet.
    pub fn get(&self, offset: u32) -> Result<bool, GpioError> {
        let mask = self.mask(offset)?;
        Ok(self.regs.read(GpioReg::InData) & mask != 0)
    }

    pub fn set(&self, offset: u32, value: bool) -> Result<(), GpioError> {
        let mask = self.mask(offset)?;
        self.regs.write(
            if value {
                GpioReg::SetData
            } else {
                GpioReg::ClrData
            },
            mask,
        );
        Ok(())
    }

    pub fn to_irq(&self, offset: u32) -> Result<u32, GpioError> {
        self.mask(offset)?;
        match self.to_irq {
            ToIrqMode::Banked {
                irq_base: Some(irq_base),
            } => Ok(irq_base + offset),
            ToIrqMode::Banked { irq_base: None } => Err(GpioError::NoDevice(self.base + offset)),
            ToIrqMode::Unbanked {
                gpio_irq,
                gpio_unbanked,
            } if offset < gpio_unbanked => Ok(gpio_irq + offset),
            ToIrqMode::Unbanked { .. } => Err(GpioError::NoDevice(self.base + offset)),
        }
    }
}

impl core::fmt::Debug for GpioController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GpioController")
            .field("index", &self.index)
            .field("base", &self.base)
            .field("ngpio", &self.ngpio)
            .field("regs", &self.regs)
            .field("to_irq", &self.to_irq)
            .finish()
    }
}
