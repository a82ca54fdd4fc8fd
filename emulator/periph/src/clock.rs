// Licensed under the Apache-2.0 license

use crate::lock;
use gpio_davinci::{ClockError, ClockGate};
use log::debug;
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Emulated clock controller. Every clock exists unless marked missing.
#[derive(Default)]
pub struct EmuClock {
    enabled: Mutex<BTreeSet<String>>,
    missing: Mutex<BTreeSet<String>>,
}

impl EmuClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes enabling `name` fail until [`Self::restore`] is called.
    pub fn fail(&self, name: &str) {
        lock(&self.missing).insert(name.to_string());
    }

    pub fn restore(&self, name: &str) {
        lock(&self.missing).remove(name);
    }

    pub fn disable(&self, name: &str) {
        if lock(&self.enabled).remove(name) {
            debug!("clock {} off", name);
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        lock(&self.enabled).contains(name)
    }
}

impl ClockGate for EmuClock {
    fn enable(&self, name: &str) -> Result<(), ClockError> {
        if lock(&self.missing).contains(name) {
            return Err(ClockError(name.to_string()));
        }
        if lock(&self.enabled).insert(name.to_string()) {
            debug!("clock {} on", name);
        }
        Ok(())
    }
}
