// Licensed under the Apache-2.0 license

use crate::chip::GpioController;
use crate::error::GpioError;
use crate::irq::{IrqTrigger, ParentIrqChip};
use crate::lock;
use crate::regs::{GpioReg, GpioRegs};
use log::debug;
use std::sync::{Arc, Mutex};

/// Lifecycle of a banked pin interrupt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PinIrqState {
    Disabled,
    /// Edge detection is enabled for the given edges.
    Armed(IrqTrigger),
    /// The bank handler is running the pin's handler.
    Pending,
}

fn check_trigger(trigger: IrqTrigger) -> Result<(), GpioError> {
    if trigger.is_empty() || !trigger.is_edge_only() {
        return Err(GpioError::InvalidArgument(format!(
            "unsupported trigger {:#x}",
            trigger.bits()
        )));
    }
    Ok(())
}

// Edges to enable for `trigger`. Anything without an edge bit means both.
fn effective_edges(trigger: IrqTrigger) -> IrqTrigger {
    match trigger.edges() {
        edges if edges.is_empty() => IrqTrigger::EDGE_BOTH,
        edges => edges,
    }
}

struct PinState {
    trigger: IrqTrigger,
    state: PinIrqState,
}

/// A logical interrupt for one pin behind a banked line.
pub struct PinIrq {
    irq: u32,
    gpio: u32,
    mask: u32,
    controller: Arc<GpioController>,
    inner: Mutex<PinState>,
}

impl PinIrq {
    pub fn new(irq: u32, gpio: u32, controller: Arc<GpioController>) -> Self {
        Self {
            irq,
            gpio,
            mask: 1 << (gpio % 32),
            controller,
            inner: Mutex::new(PinState {
                trigger: IrqTrigger::empty(),
                state: PinIrqState::Disabled,
            }),
        }
    }

    pub fn irq(&self) -> u32 {
        self.irq
    }

    pub fn gpio(&self) -> u32 {
        self.gpio
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn controller(&self) -> &Arc<GpioController> {
        &self.controller
    }

    /// The trigger last stored by [`Self::set_trigger_type`].
    pub fn trigger(&self) -> IrqTrigger {
        lock(&self.inner).trigger
    }

    pub fn state(&self) -> PinIrqState {
        lock(&self.inner).state
    }

    fn regs(&self) -> &GpioRegs {
        self.controller.regs()
    }

    fn write_enable(&self, trigger: IrqTrigger) -> IrqTrigger {
        let edges = effective_edges(trigger);
        if edges.contains(IrqTrigger::EDGE_FALLING) {
            self.regs().write(GpioReg::SetFalling, self.mask);
        }
        if edges.contains(IrqTrigger::EDGE_RISING) {
            self.regs().write(GpioReg::SetRising, self.mask);
        }
        edges
    }

    fn write_disable(&self) {
        self.regs().write(GpioReg::ClrFalling, self.mask);
        self.regs().write(GpioReg::ClrRising, self.mask);
    }

    /// Enables edge detection for the stored trigger, or for both edges when
    /// no edge has been configured.
    pub fn enable(&self) {
        let mut inner = lock(&self.inner);
        let edges = self.write_enable(inner.trigger);
        inner.state = PinIrqState::Armed(edges);
    }

    pub fn disable(&self) {
        let mut inner = lock(&self.inner);
        self.write_disable();
        inner.state = PinIrqState::Disabled;
    }

    /// Stores a new trigger. An interrupt that is already enabled is re-armed
    /// with edge detection off in between.
    pub fn set_trigger_type(&self, trigger: IrqTrigger) -> Result<(), GpioError> {
        check_trigger(trigger)?;
        let mut inner = lock(&self.inner);
        inner.trigger = trigger;
        match inner.state {
            PinIrqState::Disabled => {}
            PinIrqState::Armed(_) => {
                self.write_disable();
                inner.state = PinIrqState::Armed(self.write_enable(trigger));
            }
            PinIrqState::Pending => {
                self.write_disable();
                self.write_enable(trigger);
            }
        }
        debug!("GPIO irq {}: trigger {:?}", self.irq, trigger);
        Ok(())
    }

    /// Marks the interrupt as being handled. Returns false if it was not armed.
    pub(crate) fn begin_dispatch(&self) -> bool {
        let mut inner = lock(&self.inner);
        match inner.state {
            PinIrqState::Armed(_) => {
                inner.state = PinIrqState::Pending;
                true
            }
            _ => false,
        }
    }

    /// Re-arms the interrupt unless its handler disabled it.
    pub(crate) fn end_dispatch(&self) {
        let mut inner = lock(&self.inner);
        if inner.state == PinIrqState::Pending {
            inner.state = PinIrqState::Armed(effective_edges(inner.trigger));
        }
    }
}

impl core::fmt::Debug for PinIrq {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PinIrq")
            .field("irq", &self.irq)
            .field("gpio", &self.gpio)
            .field("mask", &format_args!("{:#x}", self.mask))
            .field("state", &self.state())
            .finish()
    }
}

/// Chip for pins with a direct line into the top-level controller.
///
/// Masking and acknowledging go straight to the parent chip; only the trigger
/// type is programmed into the GPIO block.
pub struct UnbankedIrqChip {
    parent: Arc<dyn ParentIrqChip>,
    regs: GpioRegs,
    gpio_irq: u32,
    triggers: Mutex<Vec<IrqTrigger>>,
}

impl UnbankedIrqChip {
    /// Covers lines `gpio_irq .. gpio_irq + count`, all defaulting to both
    /// edges.
    pub fn new(parent: Arc<dyn ParentIrqChip>, regs: GpioRegs, gpio_irq: u32, count: u32) -> Self {
        Self {
            parent,
            regs,
            gpio_irq,
            triggers: Mutex::new(vec![IrqTrigger::EDGE_BOTH; count as usize]),
        }
    }

    pub fn name(&self) -> &'static str {
        "GPIO-AINTC"
    }

    pub fn irqs(&self) -> std::ops::Range<u32> {
        self.gpio_irq..self.gpio_irq.saturating_add(lock(&self.triggers).len() as u32)
    }

    pub fn covers(&self, irq: u32) -> bool {
        self.irqs().contains(&irq)
    }

    fn index(&self, irq: u32) -> Result<usize, GpioError> {
        if !self.covers(irq) {
            return Err(GpioError::NoDevice(irq));
        }
        Ok((irq - self.gpio_irq) as usize)
    }

    pub fn trigger(&self, irq: u32) -> Option<IrqTrigger> {
        let index = self.index(irq).ok()?;
        lock(&self.triggers).get(index).copied()
    }

    pub fn set_trigger_type(&self, irq: u32, trigger: IrqTrigger) -> Result<(), GpioError> {
        let index = self.index(irq)?;
        check_trigger(trigger)?;
        let mask = 1 << (index % 32);
        let mut triggers = lock(&self.triggers);
        self.regs.write(
            if trigger.contains(IrqTrigger::EDGE_FALLING) {
                GpioReg::SetFalling
            } else {
                GpioReg::ClrFalling
            },
            mask,
        );
        self.regs.write(
            if trigger.contains(IrqTrigger::EDGE_RISING) {
                GpioReg::SetRising
            } else {
                GpioReg::ClrRising
            },
            mask,
        );
        triggers[index] = trigger;
        Ok(())
    }

    pub fn mask(&self, irq: u32) -> Result<(), GpioError> {
        self.index(irq)?;
        self.parent.mask(irq);
        Ok(())
    }

    pub fn unmask(&self, irq: u32) -> Result<(), GpioError> {
        self.index(irq)?;
        self.parent.unmask(irq);
        Ok(())
    }

    pub fn ack(&self, irq: u32) -> Result<(), GpioError> {
        self.index(irq)?;
        self.parent.ack(irq);
        Ok(())
    }
}
