use std::any::Any;
use std::fmt;

use thiserror::Error;

/// Errors surfaced at the crate boundary.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// A constructor or setter was given an out-of-range value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// One or more worker tasks failed. The payload carries every underlying
    /// failure message.
    #[error("{0}")]
    Async(ErrorList),
}

/// Collects failure messages from asynchronous tasks into a single report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorList {
    messages: Vec<String>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Record a panic payload as produced by `std::panic::catch_unwind`.
    pub fn push_panic(&mut self, payload: &(dyn Any + Send)) {
        if let Some(message) = payload.downcast_ref::<&str>() {
            self.push(*message);
        } else if let Some(message) = payload.downcast_ref::<String>() {
            self.push(message.clone());
        } else {
            self.push("worker task panicked with a non-string payload");
        }
    }

    pub fn merge(&mut self, mut other: ErrorList) {
        self.messages.append(&mut other.messages);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// `Ok(())` when no failures were recorded, `Error::Async` otherwise.
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Async(self))
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "worker task failure(s):")?;
        for message in &self.messages {
            writeln!(f, "{message}")?;
        }
        Ok(())
    }
}
