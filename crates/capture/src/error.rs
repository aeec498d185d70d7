use std::{error::Error as StdError, time::Duration};

use crate::join::StepName;

/// Crate-wide result type for join and capture operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors for the join flow and the capture engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The join link has no recognizable meeting-id segment.
    #[error("invalid meeting link: {link}")]
    InvalidLink { link: String },

    /// A required join step failed; the whole run is aborted.
    #[error("join failed at step {step}: {source}")]
    JoinFailure {
        step: StepName,
        #[source]
        source: Box<Error>,
    },

    /// A bounded wait expired.
    #[error("timed out after {}ms waiting for {what}", after.as_millis())]
    Timeout { what: String, after: Duration },

    /// The automation driver reported a failure.
    #[error("driver error: {context}: {source}")]
    Driver {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The event sink rejected a message.
    #[error("event sink error: {source}")]
    Sink {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn invalid_link(link: impl Into<String>) -> Self {
        Self::InvalidLink { link: link.into() }
    }

    #[must_use]
    pub fn timeout(what: impl std::fmt::Display, after: Duration) -> Self {
        Self::Timeout {
            what: what.to_string(),
            after,
        }
    }

    #[must_use]
    pub fn driver(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Driver {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn sink(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Sink {
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn join_failure(step: StepName, source: Error) -> Self {
        Self::JoinFailure {
            step,
            source: Box::new(source),
        }
    }

    /// Whether this error is an expired wait rather than a hard failure.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
