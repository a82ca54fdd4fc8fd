// Licensed under the Apache-2.0 license

//! In-memory FIFO hardware used by the unit tests.

use crate::hil::{HwError, MailboxIrq, MailboxOps, MboxMsg};
use crate::lock;
use mbox_config::FifoType;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    rx: VecDeque<MboxMsg>,
    tx: VecDeque<MboxMsg>,
    rx_en: bool,
    tx_en: bool,
    tx_forced_full: bool,
    fail_next_startup: bool,
    startups: u32,
    shutdowns: u32,
    rx_acks: u32,
    saves: u32,
    restores: u32,
}

#[derive(Clone)]
pub struct MockOps {
    hw_type: FifoType,
    depth: usize,
    state: Arc<Mutex<MockState>>,
}

impl MockOps {
    pub fn new(hw_type: FifoType, depth: usize) -> Self {
        Self {
            hw_type,
            depth,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn remote_post(&self, msg: MboxMsg) -> bool {
        let mut state = lock(&self.state);
        if state.rx.len() >= self.depth {
            return false;
        }
        state.rx.push_back(msg);
        true
    }

    pub fn remote_take(&self) -> Vec<MboxMsg> {
        lock(&self.state).tx.drain(..).collect()
    }

    pub fn set_tx_full(&self, full: bool) {
        lock(&self.state).tx_forced_full = full;
    }

    pub fn fail_next_startup(&self) {
        lock(&self.state).fail_next_startup = true;
    }

    pub fn startups(&self) -> u32 {
        lock(&self.state).startups
    }

    pub fn shutdowns(&self) -> u32 {
        lock(&self.state).shutdowns
    }

    pub fn rx_acks(&self) -> u32 {
        lock(&self.state).rx_acks
    }

    pub fn tx_irq_enabled(&self) -> bool {
        lock(&self.state).tx_en
    }

    pub fn ctx_calls(&self) -> (u32, u32) {
        let state = lock(&self.state);
        (state.saves, state.restores)
    }

    fn tx_full(&self, state: &MockState) -> bool {
        state.tx_forced_full || state.tx.len() >= self.depth
    }
}

impl MailboxOps for MockOps {
    fn hw_type(&self) -> FifoType {
        self.hw_type
    }

    fn startup(&self) -> Result<(), HwError> {
        let mut state = lock(&self.state);
        if state.fail_next_startup {
            state.fail_next_startup = false;
            return Err(HwError::ClockUnavailable("mailbox".to_string()));
        }
        state.startups += 1;
        state.rx_en = true;
        Ok(())
    }

    fn shutdown(&self) {
        let mut state = lock(&self.state);
        state.shutdowns += 1;
        state.rx_en = false;
        state.tx_en = false;
    }

    fn fifo_read(&self) -> MboxMsg {
        lock(&self.state).rx.pop_front().unwrap_or(0)
    }

    fn fifo_write(&self, msg: MboxMsg) {
        lock(&self.state).tx.push_back(msg);
    }

    fn fifo_empty(&self) -> bool {
        lock(&self.state).rx.is_empty()
    }

    fn fifo_full(&self) -> bool {
        let state = lock(&self.state);
        self.tx_full(&state)
    }

    fn enable_irq(&self, irq: MailboxIrq) {
        let mut state = lock(&self.state);
        match irq {
            MailboxIrq::Tx => state.tx_en = true,
            MailboxIrq::Rx => state.rx_en = true,
        }
    }

    fn disable_irq(&self, irq: MailboxIrq) {
        let mut state = lock(&self.state);
        match irq {
            MailboxIrq::Tx => state.tx_en = false,
            MailboxIrq::Rx => state.rx_en = false,
        }
    }

    fn ack_irq(&self, irq: MailboxIrq) {
        if irq == MailboxIrq::Rx {
            lock(&self.state).rx_acks += 1;
        }
    }

    fn is_irq(&self, irq: MailboxIrq) -> bool {
        let state = lock(&self.state);
        match irq {
            MailboxIrq::Tx => state.tx_en && !self.tx_full(&state),
            MailboxIrq::Rx => state.rx_en && !state.rx.is_empty(),
        }
    }

    fn save_ctx(&self) {
        lock(&self.state).saves += 1;
    }

    fn restore_ctx(&self) {
        lock(&self.state).restores += 1;
    }
}

pub fn init_logging() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}
