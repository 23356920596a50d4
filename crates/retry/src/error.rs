//! Failure taxonomy for dispatched call attempts
//!
//! Every attempt the driver makes either produces a response or a
//! [`CallError`]. Classification (throttling vs transient vs terminal) is
//! decided by the dispatcher that observed the wire response or transport
//! failure; the retry machinery only consumes the classification through the
//! predicates on this type.

use thiserror::Error;

/// A classified failure produced by a single call attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The request never completed at the transport level.
    #[error("network I/O error: {message}")]
    NetworkIo { message: String },

    /// The service signalled that the client is exceeding its allowed rate.
    #[error("request throttled by the service: {message}")]
    Throttling { message: String, status: Option<u16>, error_code: Option<String> },

    /// A server-side fault that is expected to clear on its own.
    #[error("transient service error: {message}")]
    ServiceTransient { message: String, status: Option<u16>, error_code: Option<String> },

    /// The service rejected the request outright.
    #[error("service rejected the request: {message}")]
    ServiceFault { message: String, status: Option<u16>, error_code: Option<String> },

    /// A client-side failure that retrying cannot fix.
    #[error("client-side failure: {message}")]
    Client { message: String },

    /// The client-wide retry capacity was too depleted to admit the attempt.
    #[error("request capacity exceeded on this client")]
    CapacityExceeded {
        #[source]
        source: Option<Box<CallError>>,
    },

    /// The enclosing request was cancelled while the attempt was in flight.
    #[error("request cancelled")]
    Cancelled,
}

impl CallError {
    /// Network-level failure with the given description.
    pub fn network_io(message: impl Into<String>) -> Self {
        Self::NetworkIo { message: message.into() }
    }

    /// Client-side failure with the given description.
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client { message: message.into() }
    }

    /// Capacity rejection, wrapping the failure that drained the bucket when
    /// one exists.
    pub fn capacity_exceeded(cause: Option<CallError>) -> Self {
        Self::CapacityExceeded { source: cause.map(Box::new) }
    }

    /// Whether the service classified this failure as throttling.
    pub fn is_throttling(&self) -> bool {
        matches!(self, Self::Throttling { .. })
    }

    /// Whether this failure kind is retryable on its own.
    ///
    /// Service faults are not retryable by kind but may still be retried when
    /// the default classifier recognises their status code or error code.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkIo { .. } | Self::Throttling { .. } | Self::ServiceTransient { .. }
        )
    }

    /// Whether this failure terminates the request unconditionally, before
    /// any retry condition is consulted.
    pub fn is_non_retryable(&self) -> bool {
        matches!(self, Self::Client { .. } | Self::CapacityExceeded { .. } | Self::Cancelled)
    }

    /// HTTP status observed for this failure, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Throttling { status, .. }
            | Self::ServiceTransient { status, .. }
            | Self::ServiceFault { status, .. } => *status,
            _ => None,
        }
    }

    /// Service error code carried by this failure, when one exists.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Throttling { error_code, .. }
            | Self::ServiceTransient { error_code, .. }
            | Self::ServiceFault { error_code, .. } => error_code.as_deref(),
            _ => None,
        }
    }
}
