// Licensed under the Apache-2.0 license

use crate::clock::EmuClock;
use crate::lock;
use gpio_davinci::ClockGate;
use log::{debug, warn};
use mailbox_framework::{HwError, MailboxIrq, MailboxOps, MboxMsg};
use mbox_config::FifoType;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::register_bitfields;
use tock_registers::registers::InMemoryRegister;

register_bitfields! [
    u32,

    /// Interrupt sources, shared by IRQENABLE and IRQSTATUS.
    MboxIrq [
        NEW_MSG OFFSET(0) NUMBITS(1) [],
        NOT_FULL OFFSET(1) NUMBITS(1) [],
    ],
];

fn field(irq: MailboxIrq) -> tock_registers::fields::Field<u32, MboxIrq::Register> {
    match irq {
        MailboxIrq::Rx => MboxIrq::NEW_MSG,
        MailboxIrq::Tx => MboxIrq::NOT_FULL,
    }
}

type IrqSink = Arc<dyn Fn(u32) + Send + Sync>;

struct MboxRegs {
    /// Messages from the remote core, read by the local side.
    rx: VecDeque<MboxMsg>,
    /// Messages written by the local side, taken by the remote core.
    tx: VecDeque<MboxMsg>,
    irqenable: InMemoryRegister<u32, MboxIrq::Register>,
    irqstatus: InMemoryRegister<u32, MboxIrq::Register>,
    saved_irqenable: Option<u32>,
    startups: u32,
    shutdowns: u32,
    saves: u32,
    restores: u32,
    lost: u32,
    overflows: u32,
}

impl MboxRegs {
    // Level-triggered sources: status follows the FIFO levels.
    fn update_status(&mut self, depth: usize) {
        if !self.rx.is_empty() {
            self.irqstatus.modify(MboxIrq::NEW_MSG::SET);
        }
        if self.tx.len() < depth {
            self.irqstatus.modify(MboxIrq::NOT_FULL::SET);
        }
    }

    fn asserted(&self) -> bool {
        self.irqstatus.get() & self.irqenable.get() != 0
    }
}

/// Emulated mailbox channel shared by the local [`EmuMailboxOps`] and the
/// remote core driven from tests.
pub struct EmuMailboxHw {
    name: String,
    irq: u32,
    depth: usize,
    regs: Mutex<MboxRegs>,
    sink: Mutex<Option<IrqSink>>,
}

impl EmuMailboxHw {
    pub fn new(name: &str, irq: u32, depth: usize) -> Arc<Self> {
        let depth = depth.max(1);
        let mut regs = MboxRegs {
            rx: VecDeque::new(),
            tx: VecDeque::new(),
            irqenable: InMemoryRegister::new(0),
            irqstatus: InMemoryRegister::new(0),
            saved_irqenable: None,
            startups: 0,
            shutdowns: 0,
            saves: 0,
            restores: 0,
            lost: 0,
            overflows: 0,
        };
        regs.update_status(depth);
        Arc::new(Self {
            name: name.to_string(),
            irq,
            depth,
            regs: Mutex::new(regs),
            sink: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn irq(&self) -> u32 {
        self.irq
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Routes the channel's interrupt line. Called outside the register lock.
    pub fn set_irq_sink(&self, sink: impl Fn(u32) + Send + Sync + 'static) {
        *lock(&self.sink) = Some(Arc::new(sink));
    }

    fn signal_if_asserted(&self, asserted: bool) {
        if !asserted {
            return;
        }
        let sink = lock(&self.sink).clone();
        if let Some(sink) = sink {
            sink(self.irq);
        }
    }

    /// Remote side writes a message. The word is lost when the FIFO is full.
    pub fn post(&self, msg: MboxMsg) -> bool {
        let asserted = {
            let mut regs = lock(&self.regs);
            if regs.rx.len() >= self.depth {
                regs.lost += 1;
                warn!("{}: FIFO full, message {:#010x} lost", self.name, msg);
                return false;
            }
            regs.rx.push_back(msg);
            regs.update_status(self.depth);
            regs.asserted()
        };
        self.signal_if_asserted(asserted);
        true
    }

    /// Remote side reads the oldest message sent by the local side.
    pub fn pop_sent(&self) -> Option<MboxMsg> {
        let (msg, asserted) = {
            let mut regs = lock(&self.regs);
            let msg = regs.tx.pop_front();
            regs.update_status(self.depth);
            (msg, msg.is_some() && regs.asserted())
        };
        self.signal_if_asserted(asserted);
        msg
    }

    /// Re-signals the line if an enabled source is still pending.
    pub fn retrigger(&self) -> bool {
        let asserted = lock(&self.regs).asserted();
        self.signal_if_asserted(asserted);
        asserted
    }

    pub fn rx_len(&self) -> usize {
        lock(&self.regs).rx.len()
    }

    pub fn tx_len(&self) -> usize {
        lock(&self.regs).tx.len()
    }

    pub fn irq_enabled(&self, irq: MailboxIrq) -> bool {
        lock(&self.regs).irqenable.is_set(field(irq))
    }

    pub fn lost(&self) -> u32 {
        lock(&self.regs).lost
    }

    /// Local writes dropped because the FIFO was full.
    pub fn overflows(&self) -> u32 {
        lock(&self.regs).overflows
    }

    pub fn startups(&self) -> u32 {
        lock(&self.regs).startups
    }

    pub fn shutdowns(&self) -> u32 {
        lock(&self.regs).shutdowns
    }

    pub fn context_ops(&self) -> (u32, u32) {
        let regs = lock(&self.regs);
        (regs.saves, regs.restores)
    }
}

/// [`MailboxOps`] over an [`EmuMailboxHw`] channel.
pub struct EmuMailboxOps {
    hw: Arc<EmuMailboxHw>,
    hw_type: FifoType,
    clock: Arc<EmuClock>,
}

impl EmuMailboxOps {
    pub fn new(hw: Arc<EmuMailboxHw>, hw_type: FifoType, clock: Arc<EmuClock>) -> Self {
        Self { hw, hw_type, clock }
    }

    pub fn hw(&self) -> &Arc<EmuMailboxHw> {
        &self.hw
    }

    fn regs(&self) -> std::sync::MutexGuard<'_, MboxRegs> {
        lock(&self.hw.regs)
    }
}

impl MailboxOps for EmuMailboxOps {
    fn hw_type(&self) -> FifoType {
        self.hw_type
    }

    fn startup(&self) -> Result<(), HwError> {
        self.clock
            .enable(&self.hw.name)
            .map_err(|e| HwError::ClockUnavailable(e.0))?;
        let mut regs = self.regs();
        regs.startups += 1;
        regs.irqenable.modify(MboxIrq::NEW_MSG::SET);
        debug!("{}: started", self.hw.name);
        Ok(())
    }

    fn shutdown(&self) {
        {
            let mut regs = self.regs();
            regs.shutdowns += 1;
            regs.irqenable.set(0);
        }
        self.clock.disable(&self.hw.name);
    }

    fn fifo_read(&self) -> MboxMsg {
        let mut regs = self.regs();
        match regs.rx.pop_front() {
            Some(msg) => msg,
            None => {
                warn!("{}: read from empty FIFO", self.hw.name);
                0
            }
        }
    }

    fn fifo_write(&self, msg: MboxMsg) {
        let mut regs = self.regs();
        if regs.tx.len() >= self.hw.depth {
            regs.overflows += 1;
            warn!("{}: write to full FIFO dropped", self.hw.name);
            return;
        }
        regs.tx.push_back(msg);
        if regs.tx.len() >= self.hw.depth {
            regs.irqstatus.modify(MboxIrq::NOT_FULL::CLEAR);
        }
    }

    fn fifo_empty(&self) -> bool {
        self.regs().rx.is_empty()
    }

    fn fifo_full(&self) -> bool {
        self.regs().tx.len() >= self.hw.depth
    }

    fn enable_irq(&self, irq: MailboxIrq) {
        let asserted = {
            let mut regs = self.regs();
            regs.irqenable.modify(field(irq).val(1));
            regs.asserted()
        };
        self.hw.signal_if_asserted(asserted);
    }

    fn disable_irq(&self, irq: MailboxIrq) {
        self.regs().irqenable.modify(field(irq).val(0));
    }

    fn ack_irq(&self, irq: MailboxIrq) {
        let still_pending = {
            let mut regs = self.regs();
            let f = field(irq);
            regs.irqstatus.modify(f.val(0));
            let depth = self.hw.depth;
            regs.update_status(depth);
            regs.irqenable.is_set(f) && regs.irqstatus.is_set(f)
        };
        // The line is level-triggered: a source that stays pending fires again.
        self.hw.signal_if_asserted(still_pending);
    }

    fn is_irq(&self, irq: MailboxIrq) -> bool {
        let regs = self.regs();
        let f = field(irq);
        regs.irqenable.is_set(f) && regs.irqstatus.is_set(f)
    }

    fn save_ctx(&self) {
        let mut regs = self.regs();
        regs.saves += 1;
        regs.saved_irqenable = Some(regs.irqenable.get());
    }

    fn restore_ctx(&self) {
        let asserted = {
            let mut regs = self.regs();
            regs.restores += 1;
            if let Some(saved) = regs.saved_irqenable.take() {
                regs.irqenable.set(saved);
            }
            regs.asserted()
        };
        self.hw.signal_if_asserted(asserted);
    }
}
