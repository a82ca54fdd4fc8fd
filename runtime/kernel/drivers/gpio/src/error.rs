// Licensed under the Apache-2.0 license

use crate::irq::ClockError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpioError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no device behind {0}")]
    NoDevice(u32),
    #[error("GPIO setup: how many GPIOs?")]
    NoGpios,
    #[error("first GPIO bank IRQ is unknown")]
    NoBankIrq,
    #[error(transparent)]
    Clock(#[from] ClockError),
}
