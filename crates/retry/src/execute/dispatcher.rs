//! Collaborator seams of the attempt driver
//!
//! The driver owns the retry loop and nothing else. Actually putting bytes
//! on the wire, classifying what came back, and spotting clock skew all
//! belong to the embedding client and reach the driver through these traits.

use std::fmt;

use async_trait::async_trait;

use crate::error::CallError;
use crate::execute::request::{RpcRequest, RpcResponse};

/// A failed attempt as reported by the dispatcher.
///
/// The classified [`CallError`] decides retryability; the wire response
/// that produced it, when the service answered at all, stays attached so
/// response headers remain available to collaborators such as the skew
/// adjuster. Transport-level failures carry no response.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    /// The classified failure.
    pub error: CallError,
    /// The wire response behind the failure, when one was received.
    pub response: Option<RpcResponse>,
}

impl AttemptFailure {
    /// Failure with no wire response attached.
    pub fn new(error: CallError) -> Self {
        Self { error, response: None }
    }

    /// Attach the wire response that produced this failure.
    pub fn with_response(mut self, response: RpcResponse) -> Self {
        self.response = Some(response);
        self
    }
}

impl From<CallError> for AttemptFailure {
    fn from(error: CallError) -> Self {
        Self::new(error)
    }
}

/// Executes a single attempt, with no retry semantics of its own.
///
/// A dispatcher classifies wire responses and transport failures into
/// [`CallError`] kinds; the driver never inspects raw responses to decide
/// retryability. A failure keeps the wire response that produced it
/// attached via [`AttemptFailure`]. Dispatch must be cancel-safe: dropping
/// the returned future abandons the attempt.
#[async_trait]
pub trait AttemptDispatcher: Send + Sync {
    async fn dispatch(&self, request: RpcRequest) -> Result<RpcResponse, AttemptFailure>;
}

/// Detects responses that indicate client/server clock skew.
///
/// When a failure is deemed indicative of skew the driver stores the
/// suggested adjustment in the client-wide offset shared by all requests.
/// Detection looks at the classified failure; the magnitude comes from the
/// wire response, whose headers carry the server's view of the time.
pub trait SkewAdjuster: fmt::Debug + Send + Sync {
    /// Whether `failure` indicates the local clock disagrees with the
    /// service.
    fn should_adjust(&self, failure: &CallError) -> bool;

    /// Suggested offset, in seconds, derived from the wire response.
    fn adjustment_secs(&self, response: &RpcResponse) -> i64;
}

/// Skew adjuster that never adjusts anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSkewAdjuster;

impl SkewAdjuster for NoSkewAdjuster {
    fn should_adjust(&self, _failure: &CallError) -> bool {
        false
    }

    fn adjustment_secs(&self, _response: &RpcResponse) -> i64 {
        0
    }
}
