//! Retry condition algebra
//!
//! A condition is a pure predicate over the attempt context, evaluated after
//! a failed attempt to decide whether another attempt may follow. The set of
//! conditions is closed, so it is modelled as a tagged enum rather than a
//! trait object. Conditions that hold shared capacity must come last inside
//! an [`RetryCondition::And`]: evaluating them earlier would spend tokens on
//! attempts some other member was about to reject anyway.

use crate::retry::context::AttemptContext;

/// HTTP status codes retried by the default classifier.
pub const RETRYABLE_STATUS_CODES: [u16; 4] = [500, 502, 503, 504];

/// Service error codes retried by the default classifier regardless of the
/// failure kind or status code.
pub const RETRYABLE_ERROR_CODES: [&str; 4] = [
    "RequestTimeout",
    "RequestTimeoutException",
    "PriorRequestNotComplete",
    "IDPCommunicationError",
];

/// Decides whether a failed attempt should be retried.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RetryCondition {
    /// Never retry.
    Never,
    /// Retry while fewer than this many retries have been attempted.
    MaxRetries(u32),
    /// Retry failures that look transient: retryable failure kinds,
    /// retryable status codes, or retryable service error codes.
    TransientClassifier,
    /// Short-circuit conjunction, evaluated in order.
    And(Vec<RetryCondition>),
}

impl RetryCondition {
    /// The classifier used when the caller does not supply a condition.
    pub fn default_condition() -> Self {
        Self::TransientClassifier
    }

    /// Conjunction of `conditions`, preserving their order.
    pub fn and(conditions: Vec<RetryCondition>) -> Self {
        Self::And(conditions)
    }

    /// Whether the failure recorded in `context` should be retried.
    pub fn should_retry(&self, context: &AttemptContext) -> bool {
        match self {
            Self::Never => false,
            Self::MaxRetries(max_retries) => context.retries_attempted() < *max_retries,
            Self::TransientClassifier => Self::is_transient(context),
            Self::And(members) => members.iter().all(|member| member.should_retry(context)),
        }
    }

    /// Hook invoked when the request terminates successfully; forwarded to
    /// every member of a conjunction.
    pub fn request_succeeded(&self, context: &AttemptContext) {
        if let Self::And(members) = self {
            for member in members {
                member.request_succeeded(context);
            }
        }
    }

    fn is_transient(context: &AttemptContext) -> bool {
        if context.last_failure().map(|failure| failure.is_retryable()).unwrap_or(false) {
            return true;
        }

        if let Some(status) = context.last_status() {
            if RETRYABLE_STATUS_CODES.contains(&status) {
                return true;
            }
        }

        context
            .last_failure()
            .and_then(|failure| failure.error_code())
            .map(|code| RETRYABLE_ERROR_CODES.contains(&code))
            .unwrap_or(false)
    }
}
