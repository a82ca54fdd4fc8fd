// Licensed under the Apache-2.0 license

use serde::{Deserialize, Serialize};

/// Largest pin count the banked register layout can address (five 32-pin blocks).
pub const MAX_GPIO: u32 = 160;

/// Describes how the GPIO block is wired into a particular SoC.
///
/// These are the defaults for a DM644x-class part and can be overridden from
/// the `[gpio]` table of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioSocInfo {
    /// Physical base address of the GPIO register window.
    pub gpio_base: u64,
    /// One more than the highest valid zero-based pin number.
    pub gpio_num: u32,
    /// Number of pins with a dedicated (unbanked) line into the top-level
    /// interrupt controller. Zero selects banked mode.
    pub gpio_unbanked: u32,
    /// First bank interrupt line on the top-level controller (or first direct
    /// line in unbanked mode).
    pub gpio_irq: u32,
    /// Number of lines owned by the top-level controller. Banked GPIO logical
    /// interrupts are numbered from here.
    pub intc_irq_num: u32,
}

impl Default for GpioSocInfo {
    fn default() -> Self {
        GpioSocInfo {
            gpio_base: 0x01c6_7000,
            gpio_num: 71,
            gpio_unbanked: 0,
            gpio_irq: 56,
            intc_irq_num: 64,
        }
    }
}

impl GpioSocInfo {
    /// Number of 32-pin controllers needed to cover `gpio_num` pins.
    pub fn controller_count(&self) -> usize {
        self.gpio_num.min(MAX_GPIO).div_ceil(32) as usize
    }

    /// Number of 16-pin interrupt banks needed to cover `gpio_num` pins.
    pub fn bank_count(&self) -> usize {
        self.gpio_num.min(MAX_GPIO).div_ceil(16) as usize
    }

    /// Whether every banked logical interrupt and every bank or direct line
    /// has a representable `u32` number.
    pub fn irq_lines_fit(&self) -> bool {
        let lines = (self.bank_count() as u32).max(self.gpio_unbanked);
        self.intc_irq_num
            .checked_add(self.gpio_num.min(MAX_GPIO))
            .is_some()
            && self.gpio_irq.checked_add(lines).is_some()
    }
}
