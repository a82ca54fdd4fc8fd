/*++

Licensed under the Apache-2.0 license.

File Name:

    gpio.rs

Abstract:

    File contains the DaVinci GPIO register block emulation.

--*/

use crate::lock;
use gpio_davinci::regs::{GpioReg, Mmio, BINTEN, MAX_GPIO};
use log::{trace, warn};
use std::sync::{Arc, Mutex};

const BLOCKS: usize = (MAX_GPIO / 32) as usize;
const FIRST_BLOCK: u64 = 0x10;
const BLOCK_SIZE: u64 = 0x28;

/// An enabled edge seen on a pin of an enabled bank.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EdgeEvent {
    pub gpio: u32,
    /// 16-pin bank of the pin.
    pub bank: u32,
}

type EdgeSink = Arc<dyn Fn(EdgeEvent) + Send + Sync>;

#[derive(Default, Clone, Copy)]
struct Block {
    dir: u32,
    out_data: u32,
    levels: u32,
    rising: u32,
    falling: u32,
    intstat: u32,
}

impl Block {
    fn in_data(&self) -> u32 {
        (self.out_data & !self.dir) | (self.levels & self.dir)
    }
}

struct GpioState {
    blocks: [Block; BLOCKS],
    binten: u32,
    writes: Vec<(u64, u32)>,
}

/// Emulated GPIO register window.
///
/// The set/clear registers are write-one-to-set and write-one-to-clear, and
/// `INTSTAT` is write-one-to-clear. Reading a set or clear edge register
/// returns the current edge enables. An edge on an input pin latches its
/// status bit when detection for that edge is enabled.
pub struct EmuGpioRegs {
    base: u64,
    state: Mutex<GpioState>,
    sink: Mutex<Option<EdgeSink>>,
}

fn decode(offset: u64) -> Option<(usize, GpioReg)> {
    let rel = offset.checked_sub(FIRST_BLOCK)?;
    let block = (rel / BLOCK_SIZE) as usize;
    if block >= BLOCKS {
        return None;
    }
    let reg = match rel % BLOCK_SIZE {
        0x00 => GpioReg::Dir,
        0x04 => GpioReg::OutData,
        0x08 => GpioReg::SetData,
        0x0c => GpioReg::ClrData,
        0x10 => GpioReg::InData,
        0x14 => GpioReg::SetRising,
        0x18 => GpioReg::ClrRising,
        0x1c => GpioReg::SetFalling,
        0x20 => GpioReg::ClrFalling,
        0x24 => GpioReg::IntStat,
        _ => return None,
    };
    Some((block, reg))
}

impl EmuGpioRegs {
    /// All pins start as inputs at low level.
    pub fn new(base: u64) -> Self {
        Self {
            base,
            state: Mutex::new(GpioState {
                blocks: [Block {
                    dir: !0,
                    ..Block::default()
                }; BLOCKS],
                binten: 0,
                writes: Vec::new(),
            }),
            sink: Mutex::new(None),
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Called with every reported edge, outside the register lock.
    pub fn set_edge_sink(&self, sink: impl Fn(EdgeEvent) + Send + Sync + 'static) {
        *lock(&self.sink) = Some(Arc::new(sink));
    }

    pub fn drive_pin(&self, gpio: u32, high: bool) {
        self.drive_pins(&[(gpio, high)]);
    }

    /// Applies all level changes, then reports every pin of an enabled bank
    /// that latched its status bit, in pin order.
    pub fn drive_pins(&self, pins: &[(u32, bool)]) {
        let mut latched: Vec<EdgeEvent> = Vec::new();
        {
            let mut state = lock(&self.state);
            let binten = state.binten;
            for &(gpio, high) in pins {
                if gpio >= MAX_GPIO {
                    warn!("GPIO emulation: no pin {}", gpio);
                    continue;
                }
                let block = &mut state.blocks[(gpio / 32) as usize];
                let bit = 1 << (gpio % 32);
                let was_high = block.levels & bit != 0;
                if high {
                    block.levels |= bit;
                } else {
                    block.levels &= !bit;
                }
                if block.dir & bit == 0 || was_high == high {
                    continue;
                }
                let enabled = if high { block.rising } else { block.falling };
                if enabled & bit == 0 {
                    continue;
                }
                block.intstat |= bit;
                let bank = gpio / 16;
                if binten & (1 << bank) != 0 {
                    latched.push(EdgeEvent { gpio, bank });
                }
            }
        }
        latched.sort_by_key(|e| e.gpio);
        let sink = lock(&self.sink).clone();
        if let Some(sink) = sink {
            for event in latched {
                sink(event);
            }
        }
    }

    /// Status bits of the 32-pin block holding `gpio`.
    pub fn intstat(&self, gpio: u32) -> u32 {
        lock(&self.state)
            .blocks
            .get((gpio / 32) as usize)
            .map_or(0, |b| b.intstat)
    }

    /// Rising and falling edge enables of the block holding `gpio`.
    pub fn edge_enables(&self, gpio: u32) -> (u32, u32) {
        lock(&self.state)
            .blocks
            .get((gpio / 32) as usize)
            .map_or((0, 0), |b| (b.rising, b.falling))
    }

    pub fn binten(&self) -> u32 {
        lock(&self.state).binten
    }

    pub fn writes(&self) -> Vec<(u64, u32)> {
        lock(&self.state).writes.clone()
    }

    pub fn clear_writes(&self) {
        lock(&self.state).writes.clear();
    }
}

impl Mmio for EmuGpioRegs {
    fn read32(&self, addr: u64) -> u32 {
        let state = lock(&self.state);
        let Some(offset) = addr.checked_sub(self.base) else {
            warn!("GPIO emulation: read below window at {:#x}", addr);
            return 0;
        };
        if offset == BINTEN {
            return state.binten;
        }
        let Some((block, reg)) = decode(offset) else {
            warn!("GPIO emulation: read of unmapped {:#x}", addr);
            return 0;
        };
        let b = &state.blocks[block];
        match reg {
            GpioReg::Dir => b.dir,
            GpioReg::OutData | GpioReg::SetData | GpioReg::ClrData => b.out_data,
            GpioReg::InData => b.in_data(),
            GpioReg::SetRising | GpioReg::ClrRising => b.rising,
            GpioReg::SetFalling | GpioReg::ClrFalling => b.falling,
            GpioReg::IntStat => b.intstat,
        }
    }

    fn write32(&self, addr: u64, value: u32) {
        let mut state = lock(&self.state);
        state.writes.push((addr, value));
        let Some(offset) = addr.checked_sub(self.base) else {
            warn!("GPIO emulation: write below window at {:#x}", addr);
            return;
        };
        if offset == BINTEN {
            state.binten = value;
            return;
        }
        let Some((block, reg)) = decode(offset) else {
            warn!("GPIO emulation: write of unmapped {:#x}", addr);
            return;
        };
        trace!("GPIO emulation: block {} {:?} <- {:#010x}", block, reg, value);
        let b = &mut state.blocks[block];
        match reg {
            GpioReg::Dir => b.dir = value,
            GpioReg::OutData => b.out_data = value,
            GpioReg::SetData => b.out_data |= value,
            GpioReg::ClrData => b.out_data &= !value,
            GpioReg::InData => {}
            GpioReg::SetRising => b.rising |= value,
            GpioReg::ClrRising => b.rising &= !value,
            GpioReg::SetFalling => b.falling |= value,
            GpioReg::ClrFalling => b.falling &= !value,
            GpioReg::IntStat => b.intstat &= !value,
        }
    }
}
