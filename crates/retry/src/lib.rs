//! Client-side retry and admission control for the relay RPC client.
//!
//! This crate decides, per request attempt, whether to issue the call, how
//! long to wait before a retry, and when client-wide retry capacity is too
//! depleted to try again. Failures drain a shared token bucket; successes
//! refill it. Sustained server errors therefore throttle the client's own
//! retry traffic instead of amplifying the outage.
//!
//! # Architecture
//!
//! - [`capacity`]: the lock-free bucket, failure pricing, and the admission
//!   seam ([`RequestCapacity`]).
//! - [`retry`]: retry modes, backoff strategies, the condition algebra, and
//!   the immutable [`RetryPolicy`] bundle.
//! - [`execute`]: the per-request [`RetryDriver`] and the collaborator
//!   traits it dispatches through.
//! - [`config`]: environment and profile-file resolution of the retry mode.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use relay_retry::{RetryDriver, RetryMode, RetryPolicy, RpcRequest};
//!
//! let policy = Arc::new(RetryPolicy::for_mode(RetryMode::Standard));
//! let driver = RetryDriver::new(policy, Arc::new(my_dispatcher));
//! let response = driver.execute(RpcRequest::new("ListThings")).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod capacity;
pub mod config;
pub mod error;
pub mod execute;
pub mod retry;

pub use capacity::{
    Acquisition, AtomicCapacity, FailureCostCalculator, RequestCapacity, TokenBucketCapacity,
    UnlimitedCapacity,
};
pub use config::{ConfigError, Env, ProcessEnv, ProfileSet, StaticEnv};
pub use error::CallError;
pub use execute::{
    AttemptDispatcher, AttemptFailure, CallOutcome, NoSkewAdjuster, RetryDriver, RpcRequest,
    RpcResponse, SkewAdjuster, INVOCATION_ID_HEADER, RETRY_INFO_HEADER,
};
pub use retry::{
    AttemptContext, BackoffStrategy, RetryCondition, RetryMode, RetryPolicy, RetryPolicyBuilder,
};
