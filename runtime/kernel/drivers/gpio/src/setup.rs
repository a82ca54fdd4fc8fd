// Licensed under the Apache-2.0 license

use crate::chip::{GpioController, ToIrqMode};
use crate::demux::BankHandler;
use crate::error::GpioError;
use crate::irq::{ClockGate, IrqDispatch, IrqTrigger, ParentIrqChip};
use crate::pin::{PinIrq, PinIrqState, UnbankedIrqChip};
use crate::regs::{GpioReg, GpioRegs, Mmio, BINTEN, MAX_GPIO};
use log::{debug, info, warn};
use mbox_config::GpioSocInfo;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How GPIO interrupts reach the top-level controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IrqMode {
    /// One line per 16-pin bank, demuxed by a [`BankHandler`].
    Banked,
    /// The first pins of controller 0 each own a line.
    Unbanked,
}

/// Wraps the generic dispatch layer to track the state of banked pins.
struct PinTracking<'a> {
    pins: &'a BTreeMap<u32, Arc<PinIrq>>,
    inner: &'a dyn IrqDispatch,
}

impl IrqDispatch for PinTracking<'_> {
    fn handle_irq(&self, irq: u32) {
        let pin = self.pins.get(&irq);
        if let Some(pin) = pin {
            if !pin.begin_dispatch() {
                debug!("GPIO irq {} fired while {:?}", irq, pin.state());
            }
        }
        self.inner.handle_irq(irq);
        if let Some(pin) = pin {
            pin.end_dispatch();
        }
    }
}

/// The GPIO controllers of a SoC together with their interrupt wiring.
pub struct GpioSubsystem {
    info: GpioSocInfo,
    mmio: Arc<dyn Mmio>,
    controllers: Vec<Arc<GpioController>>,
    mode: IrqMode,
    pins: BTreeMap<u32, Arc<PinIrq>>,
    banks: BTreeMap<u32, BankHandler>,
    unbanked: Option<UnbankedIrqChip>,
    parent: Arc<dyn ParentIrqChip>,
    dispatch: Arc<dyn IrqDispatch>,
    irq_count: u32,
}

impl GpioSubsystem {
    /// Creates the controllers described by `info` and wires their interrupts.
    ///
    /// In banked mode every edge enable starts cleared; in unbanked mode the
    /// direct lines default to both edges.
    pub fn setup(
        info: &GpioSocInfo,
        mmio: Arc<dyn Mmio>,
        parent: Arc<dyn ParentIrqChip>,
        dispatch: Arc<dyn IrqDispatch>,
        clock: &dyn ClockGate,
    ) -> Result<Self, GpioError> {
        let mut info = info.clone();
        if info.gpio_num == 0 {
            return Err(GpioError::NoGpios);
        }
        if info.gpio_num > MAX_GPIO {
            warn!(
                "GPIO setup: {} GPIOs requested, limiting to {}",
                info.gpio_num, MAX_GPIO
            );
            info.gpio_num = MAX_GPIO;
        }
        if info.gpio_irq == 0 {
            return Err(GpioError::NoBankIrq);
        }
        if info.gpio_unbanked > 32 || info.gpio_unbanked > info.gpio_num {
            return Err(GpioError::InvalidArgument(format!(
                "{} unbanked GPIO irqs",
                info.gpio_unbanked
            )));
        }
        if !info.irq_lines_fit() {
            return Err(GpioError::InvalidArgument(format!(
                "irq lines from {} / {} overflow",
                info.gpio_irq, info.intc_irq_num
            )));
        }
        let mode = if info.gpio_unbanked != 0 {
            IrqMode::Unbanked
        } else {
            IrqMode::Banked
        };
        let ngpio = info.gpio_num;

        let regs_for = |gpio: u32| {
            GpioRegs::for_gpio(mmio.clone(), info.gpio_base, gpio)
                .ok_or(GpioError::NoDevice(gpio))
        };

        let mut controllers = Vec::new();
        for (index, base) in (0..ngpio).step_by(32).enumerate() {
            let to_irq = match mode {
                IrqMode::Unbanked if index == 0 => ToIrqMode::Unbanked {
                    gpio_irq: info.gpio_irq,
                    gpio_unbanked: info.gpio_unbanked,
                },
                IrqMode::Unbanked => ToIrqMode::Banked { irq_base: None },
                IrqMode::Banked => ToIrqMode::Banked {
                    irq_base: Some(info.intc_irq_num + base),
                },
            };
            controllers.push(Arc::new(GpioController::new(
                index,
                base,
                ngpio - base,
                regs_for(base)?,
                to_irq,
            )));
        }

        clock.enable("gpio")?;

        let mut pins = BTreeMap::new();
        let mut banks = BTreeMap::new();
        let mut unbanked = None;
        let mut binten = 0u32;
        let irq_count;

        match mode {
            IrqMode::Unbanked => {
                let regs = regs_for(0)?;
                regs.write(GpioReg::SetFalling, !0);
                regs.write(GpioReg::SetRising, !0);
                unbanked = Some(UnbankedIrqChip::new(
                    parent.clone(),
                    regs,
                    info.gpio_irq,
                    info.gpio_unbanked,
                ));
                binten = 1;
                irq_count = info.gpio_unbanked;
            }
            IrqMode::Banked => {
                for (bank, first_gpio) in (0..ngpio).step_by(16).enumerate() {
                    let controller = controllers[(first_gpio / 32) as usize].clone();
                    let regs = controller.regs();
                    regs.write(GpioReg::ClrFalling, !0);
                    regs.write(GpioReg::ClrRising, !0);

                    let bank_irq = info.gpio_irq + bank as u32;
                    let first_irq = info.intc_irq_num + first_gpio;
                    for gpio in first_gpio..(first_gpio + 16).min(ngpio) {
                        let irq = info.intc_irq_num + gpio;
                        pins.insert(irq, Arc::new(PinIrq::new(irq, gpio, controller.clone())));
                    }
                    banks.insert(
                        bank_irq,
                        BankHandler::new(controller, bank_irq, bank % 2 == 1, first_irq),
                    );
                    binten |= 1 << bank;
                }
                irq_count = ngpio;
            }
        }

        mmio.write32(info.gpio_base + BINTEN, binten);
        info!("DaVinci: {} gpio irqs", irq_count);

        Ok(Self {
            info,
            mmio,
            controllers,
            mode,
            pins,
            banks,
            unbanked,
            parent,
            dispatch,
            irq_count,
        })
    }

    pub fn info(&self) -> &GpioSocInfo {
        &self.info
    }

    pub fn mode(&self) -> IrqMode {
        self.mode
    }

    pub fn irq_count(&self) -> u32 {
        self.irq_count
    }

    pub fn controllers(&self) -> &[Arc<GpioController>] {
        &self.controllers
    }

    pub fn controller(&self, index: usize) -> Option<&Arc<GpioController>> {
        self.controllers.get(index)
    }

    /// Bank lines with a chained handler, in ascending order.
    pub fn bank_irqs(&self) -> Vec<u32> {
        self.banks.keys().copied().collect()
    }

    pub fn bank(&self, bank_irq: u32) -> Option<&BankHandler> {
        self.banks.get(&bank_irq)
    }

    pub fn pin(&self, irq: u32) -> Option<&Arc<PinIrq>> {
        self.pins.get(&irq)
    }

    /// State of a banked pin interrupt.
    pub fn pin_state(&self, irq: u32) -> Option<PinIrqState> {
        self.pins.get(&irq).map(|pin| pin.state())
    }

    pub fn unbanked_chip(&self) -> Option<&UnbankedIrqChip> {
        self.unbanked.as_ref()
    }

    /// Current value of the per-bank interrupt enable register.
    pub fn binten(&self) -> u32 {
        self.mmio.read32(self.info.gpio_base + BINTEN)
    }

    fn controller_for(&self, gpio: u32) -> Result<&Arc<GpioController>, GpioError> {
        if gpio >= self.info.gpio_num {
            return Err(GpioError::InvalidArgument(format!("no GPIO {}", gpio)));
        }
        self.controllers
            .get((gpio / 32) as usize)
            .ok_or(GpioError::NoDevice(gpio))
    }

    /// Maps a global pin number onto its logical interrupt.
    pub fn to_irq(&self, gpio: u32) -> Result<u32, GpioError> {
        self.controller_for(gpio)?.to_irq(gpio % 32)
    }

    pub fn direction_input(&self, gpio: u32) -> Result<(), GpioError> {
        self.controller_for(gpio)?.direction_input(gpio % 32)
    }

    pub fn direction_output(&self, gpio: u32, value: bool) -> Result<(), GpioError> {
        self.controller_for(gpio)?.direction_output(gpio % 32, value)
    }

    pub fn get(&self, gpio: u32) -> Result<bool, GpioError> {
        self.controller_for(gpio)?.get(gpio % 32)
    }

    pub fn set(&self, gpio: u32, value: bool) -> Result<(), GpioError> {
        self.controller_for(gpio)?.set(gpio % 32, value)
    }

    pub fn irq_enable(&self, irq: u32) -> Result<(), GpioError> {
        if let Some(pin) = self.pins.get(&irq) {
            pin.enable();
            return Ok(());
        }
        match &self.unbanked {
            Some(chip) => chip.unmask(irq),
            None => Err(GpioError::NoDevice(irq)),
        }
    }

    pub fn irq_disable(&self, irq: u32) -> Result<(), GpioError> {
        if let Some(pin) = self.pins.get(&irq) {
            pin.disable();
            return Ok(());
        }
        match &self.unbanked {
            Some(chip) => chip.mask(irq),
            None => Err(GpioError::NoDevice(irq)),
        }
    }

    pub fn irq_set_type(&self, irq: u32, trigger: IrqTrigger) -> Result<(), GpioError> {
        if let Some(pin) = self.pins.get(&irq) {
            return pin.set_trigger_type(trigger);
        }
        match &self.unbanked {
            Some(chip) => chip.set_trigger_type(irq, trigger),
            None => Err(GpioError::NoDevice(irq)),
        }
    }

    /// Entry point for a bank line raised by the top-level controller.
    /// Returns the number of pin interrupts dispatched.
    pub fn handle_bank_irq(&self, bank_irq: u32) -> Result<usize, GpioError> {
        let bank = self
            .banks
            .get(&bank_irq)
            .ok_or(GpioError::NoDevice(bank_irq))?;
        let tracking = PinTracking {
            pins: &self.pins,
            inner: self.dispatch.as_ref(),
        };
        Ok(bank.handle(self.parent.as_ref(), &tracking))
    }
}

impl core::fmt::Debug for GpioSubsystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GpioSubsystem")
            .field("info", &self.info)
            .field("mode", &self.mode)
            .field("controllers", &self.controllers.len())
            .field("irq_count", &self.irq_count)
            .finish()
    }
}
