// Licensed under the Apache-2.0 license

//! Interfaces of the interrupt and clock services the GPIO driver plugs into.

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Interrupt trigger types.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
    pub struct IrqTrigger: u32 {
        const EDGE_RISING = 0x1;
        const EDGE_FALLING = 0x2;
        const EDGE_BOTH = Self::EDGE_RISING.bits() | Self::EDGE_FALLING.bits();
        const LEVEL_HIGH = 0x4;
        const LEVEL_LOW = 0x8;
    }
}

impl IrqTrigger {
    /// Edge bits of `self`, the only trigger types the GPIO block supports.
    pub fn edges(self) -> Self {
        self & Self::EDGE_BOTH
    }

    /// True if `self` only names edge triggers.
    pub fn is_edge_only(self) -> bool {
        (self - Self::EDGE_BOTH).is_empty()
    }
}

/// The top-level interrupt controller a GPIO interrupt line is wired to.
pub trait ParentIrqChip: Send + Sync {
    fn mask(&self, irq: u32);
    fn unmask(&self, irq: u32);
    fn ack(&self, irq: u32);
}

/// The generic interrupt layer that runs the handlers of logical interrupts.
pub trait IrqDispatch: Send + Sync {
    fn handle_irq(&self, irq: u32);
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("error getting {0} clock")]
pub struct ClockError(pub String);

/// Clock enable service.
pub trait ClockGate: Send + Sync {
    fn enable(&self, name: &str) -> Result<(), ClockError>;
}
