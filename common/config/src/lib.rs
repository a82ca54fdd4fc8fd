// Licensed under the Apache-2.0 license

//! Configuration shared by the mailbox framework, the GPIO driver and the
//! emulated platform.
//!
//! The defaults describe a small two-endpoint DSP mailbox and a DM644x-class
//! GPIO block; a TOML file can override any of them.

mod gpio;

pub use gpio::{GpioSocInfo, MAX_GPIO};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Default per-direction software queue size, in messages.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default hardware FIFO depth, in messages.
pub const DEFAULT_FIFO_DEPTH: usize = 4;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Hardware generation of a mailbox FIFO.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FifoType {
    /// Single-word mailbox: one message is latched per receive interrupt.
    Fifo1,
    /// Multi-word FIFO: all pending messages can be read per interrupt.
    #[default]
    Fifo2,
}

/// One physical mailbox channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub irq: u32,
    #[serde(default)]
    pub hw_type: FifoType,
    #[serde(default = "default_fifo_depth")]
    pub fifo_depth: usize,
    /// Overrides [`MailboxConfig::queue_capacity`] for this endpoint.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
}

fn default_fifo_depth() -> usize {
    DEFAULT_FIFO_DEPTH
}

impl EndpointConfig {
    pub fn new(name: &str, irq: u32, hw_type: FifoType) -> Self {
        EndpointConfig {
            name: name.to_string(),
            irq,
            hw_type,
            fifo_depth: DEFAULT_FIFO_DEPTH,
            queue_capacity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    pub queue_capacity: usize,
    pub endpoints: Vec<EndpointConfig>,
    pub gpio: GpioSocInfo,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        MailboxConfig {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            endpoints: vec![
                EndpointConfig::new("dsp", 10, FifoType::Fifo2),
                EndpointConfig::new("iva", 11, FifoType::Fifo2),
            ],
            gpio: GpioSocInfo::default(),
        }
    }
}

impl MailboxConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: MailboxConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Queue capacity that applies to `endpoint`.
    pub fn capacity_for(&self, endpoint: &EndpointConfig) -> usize {
        endpoint.queue_capacity.unwrap_or(self.queue_capacity)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be non-zero".to_string(),
            ));
        }
        let mut names = HashSet::new();
        for ep in &self.endpoints {
            if ep.name.is_empty() {
                return Err(ConfigError::Invalid("endpoint with empty name".to_string()));
            }
            if !names.insert(ep.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate endpoint name {:?}",
                    ep.name
                )));
            }
            if ep.fifo_depth == 0 {
                return Err(ConfigError::Invalid(format!(
                    "endpoint {:?}: fifo_depth must be non-zero",
                    ep.name
                )));
            }
            if ep.queue_capacity == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "endpoint {:?}: queue_capacity must be non-zero",
                    ep.name
                )));
            }
        }
        if self.gpio.gpio_unbanked > 32 {
            return Err(ConfigError::Invalid(format!(
                "gpio_unbanked ({}) exceeds the 32 pins of the first controller",
                self.gpio.gpio_unbanked
            )));
        }
        if !self.gpio.irq_lines_fit() {
            return Err(ConfigError::Invalid(format!(
                "gpio interrupt lines overflow (gpio_irq {}, intc_irq_num {})",
                self.gpio.gpio_irq, self.gpio.intc_irq_num
            )));
        }
        Ok(())
    }
}
