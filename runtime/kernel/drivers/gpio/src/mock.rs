// Licensed under the Apache-2.0 license

//! Register and interrupt controller doubles for the unit tests.

use crate::irq::{ClockError, ClockGate, IrqDispatch, ParentIrqChip};
use crate::lock;
use crate::regs::{GpioReg, Mmio};
use std::collections::HashMap;
use std::sync::Mutex;

/// Plain register store. `INTSTAT` is write-one-to-clear, everything else
/// keeps the last value written.
pub struct MockMmio {
    base: u64,
    regs: Mutex<HashMap<u64, u32>>,
    writes: Mutex<Vec<(u64, u32)>>,
}

impl MockMmio {
    pub fn new(base: u64) -> Self {
        Self {
            base,
            regs: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    fn is_intstat(&self, addr: u64) -> bool {
        addr >= self.base + 0x10 && (addr - self.base - 0x10) % 0x28 == GpioReg::IntStat.offset()
    }

    /// Sets a register without logging a write.
    pub fn poke(&self, addr: u64, value: u32) {
        lock(&self.regs).insert(addr, value);
    }

    pub fn peek(&self, addr: u64) -> u32 {
        lock(&self.regs).get(&addr).copied().unwrap_or(0)
    }

    pub fn writes(&self) -> Vec<(u64, u32)> {
        lock(&self.writes).clone()
    }

    pub fn clear_writes(&self) {
        lock(&self.writes).clear();
    }
}

impl Mmio for MockMmio {
    fn read32(&self, addr: u64) -> u32 {
        self.peek(addr)
    }

    fn write32(&self, addr: u64, value: u32) {
        lock(&self.writes).push((addr, value));
        let mut regs = lock(&self.regs);
        if self.is_intstat(addr) {
            *regs.entry(addr).or_default() &= !value;
        } else {
            regs.insert(addr, value);
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Event {
    Mask(u32),
    Unmask(u32),
    Ack(u32),
    Dispatch(u32),
}

type Hook = Box<dyn Fn(u32) + Send + Sync>;

/// Records parent chip calls and dispatched interrupts in one ordered log.
#[derive(Default)]
pub struct MockIrq {
    events: Mutex<Vec<Event>>,
    hook: Mutex<Option<Hook>>,
}

impl MockIrq {
    pub fn events(&self) -> Vec<Event> {
        lock(&self.events).clone()
    }

    pub fn dispatched(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Dispatch(irq) => Some(irq),
                _ => None,
            })
            .collect()
    }

    /// Runs `hook` for every dispatched interrupt.
    pub fn on_dispatch(&self, hook: impl Fn(u32) + Send + Sync + 'static) {
        *lock(&self.hook) = Some(Box::new(hook));
    }
}

impl ParentIrqChip for MockIrq {
    fn mask(&self, irq: u32) {
        lock(&self.events).push(Event::Mask(irq));
    }

    fn unmask(&self, irq: u32) {
        lock(&self.events).push(Event::Unmask(irq));
    }

    fn ack(&self, irq: u32) {
        lock(&self.events).push(Event::Ack(irq));
    }
}

impl IrqDispatch for MockIrq {
    fn handle_irq(&self, irq: u32) {
        lock(&self.events).push(Event::Dispatch(irq));
        if let Some(hook) = lock(&self.hook).as_ref() {
            hook(irq);
        }
    }
}

#[derive(Default)]
pub struct MockClock {
    pub fail: bool,
    pub enabled: Mutex<Vec<String>>,
}

impl ClockGate for MockClock {
    fn enable(&self, name: &str) -> Result<(), ClockError> {
        if self.fail {
            return Err(ClockError(name.to_string()));
        }
        lock(&self.enabled).push(name.to_string());
        Ok(())
    }
}

pub fn init_logging() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}
