// Licensed under the Apache-2.0 license

//! GPIO register map.
//!
//! Each 32-pin controller owns one block of ten registers. The interrupt
//! status and edge enable registers of a block serve two 16-pin banks: bank
//! `2n` in the low half and bank `2n + 1` in the high half.

use std::sync::Arc;

/// Largest number of pins the register map can address.
pub const MAX_GPIO: u32 = mbox_config::MAX_GPIO;

/// Per-bank interrupt enable register, one bit per 16-pin bank.
pub const BINTEN: u64 = 0x08;

/// Offsets of the controller blocks from the GPIO base.
const BLOCK_OFFSETS: [u64; 5] = [0x10, 0x38, 0x60, 0x88, 0xb0];

/// Raw 32-bit memory mapped I/O.
pub trait Mmio: Send + Sync {
    fn read32(&self, addr: u64) -> u32;
    fn write32(&self, addr: u64, value: u32);
}

/// Registers of one controller block, as offsets from the block start.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u64)]
pub enum GpioReg {
    Dir = 0x00,
    OutData = 0x04,
    SetData = 0x08,
    ClrData = 0x0c,
    InData = 0x10,
    SetRising = 0x14,
    ClrRising = 0x18,
    SetFalling = 0x1c,
    ClrFalling = 0x20,
    IntStat = 0x24,
}

impl GpioReg {
    pub const fn offset(self) -> u64 {
        self as u64
    }
}

/// Offset of the register block holding `gpio`, or `None` past the last
/// block.
pub fn block_offset(gpio: u32) -> Option<u64> {
    BLOCK_OFFSETS.get((gpio / 32) as usize).copied()
}

/// Handle on the register block of one controller.
#[derive(Clone)]
pub struct GpioRegs {
    mmio: Arc<dyn Mmio>,
    block: u64,
}

impl GpioRegs {
    /// Returns the block covering `gpio`, or `None` if `gpio` is past the
    /// register map.
    pub fn for_gpio(mmio: Arc<dyn Mmio>, gpio_base: u64, gpio: u32) -> Option<Self> {
        let block = gpio_base + block_offset(gpio)?;
        Some(Self { mmio, block })
    }

    pub fn block(&self) -> u64 {
        self.block
    }

    pub fn read(&self, reg: GpioReg) -> u32 {
        self.mmio.read32(self.block + reg.offset())
    }

    pub fn write(&self, reg: GpioReg, value: u32) {
        self.mmio.write32(self.block + reg.offset(), value)
    }
}

impl core::fmt::Debug for GpioRegs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "GpioRegs({:#x})", self.block)
    }
}
