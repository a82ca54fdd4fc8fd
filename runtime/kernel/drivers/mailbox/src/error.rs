// Licensed under the Apache-2.0 license

use crate::hil::HwError;
use thiserror::Error;

/// Errors returned by the mailbox framework.
///
/// Every error is scoped to one endpoint or one call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailboxError {
    #[error("no mailbox named {0:?} is registered")]
    NotFound(String),
    #[error("mailbox {name:?} failed to start up")]
    Startup {
        name: String,
        #[source]
        source: HwError,
    },
    #[error("mailbox queue is full")]
    QueueFull,
    #[error("mailbox queue is empty")]
    QueueEmpty,
    #[error("a mailbox named {0:?} is already registered")]
    AlreadyRegistered(String),
    #[error("mailbox {0:?} needs a non-zero queue capacity")]
    InvalidQueueCapacity(String),
}
