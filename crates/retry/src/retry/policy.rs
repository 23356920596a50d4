//! The immutable retry policy bundle
//!
//! One policy is built per client and shared read-only by every concurrent
//! request. It bundles the retry budget, the aggregated retry condition,
//! both backoff strategies, and the admission capacity.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::capacity::request::{RequestCapacity, TokenBucketCapacity, UnlimitedCapacity};
use crate::config::ConfigError;
use crate::retry::backoff::BackoffStrategy;
use crate::retry::condition::RetryCondition;
use crate::retry::mode::RetryMode;

/// Immutable bundle of everything the driver needs to retry one request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    mode: RetryMode,
    num_retries: u32,
    backoff: BackoffStrategy,
    throttling_backoff: BackoffStrategy,
    aggregate_condition: RetryCondition,
    capacity: Arc<dyn RequestCapacity>,
}

impl RetryPolicy {
    /// Builder with defaults derived from `mode`.
    pub fn builder(mode: RetryMode) -> RetryPolicyBuilder {
        RetryPolicyBuilder::new(mode)
    }

    /// The default policy for `mode`.
    pub fn for_mode(mode: RetryMode) -> Self {
        Self::builder(mode).build()
    }

    /// The default policy for the process-wide resolved mode.
    pub fn resolve_default() -> Result<Self, ConfigError> {
        Ok(Self::for_mode(RetryMode::resolve_default()?))
    }

    /// A policy that never retries and imposes no admission control.
    pub fn none() -> Self {
        Self::builder(RetryMode::Legacy)
            .num_retries(0)
            .backoff_strategy(BackoffStrategy::none())
            .throttling_backoff_strategy(BackoffStrategy::none())
            .retry_condition(RetryCondition::Never)
            .request_capacity(Arc::new(UnlimitedCapacity))
            .build()
    }

    /// The mode this policy's defaults were derived from.
    pub fn mode(&self) -> RetryMode {
        self.mode
    }

    /// Maximum number of retries after the first attempt.
    pub fn num_retries(&self) -> u32 {
        self.num_retries
    }

    /// The aggregated retry condition, including the retry budget.
    pub fn retry_condition(&self) -> &RetryCondition {
        &self.aggregate_condition
    }

    /// Backoff used for non-throttling failures.
    pub fn backoff_strategy(&self) -> &BackoffStrategy {
        &self.backoff
    }

    /// Backoff used for throttling failures.
    pub fn throttling_backoff_strategy(&self) -> &BackoffStrategy {
        &self.throttling_backoff
    }

    /// The admission capacity shared by all requests under this policy.
    pub fn request_capacity(&self) -> &Arc<dyn RequestCapacity> {
        &self.capacity
    }
}

// The aggregate condition already encodes num_retries and the user
// condition, so two policies are equal exactly when they would make the
// same retry decisions. The capacity binding is deliberately excluded: it
// is runtime state, not decision shape.
impl PartialEq for RetryPolicy {
    fn eq(&self, other: &Self) -> bool {
        self.aggregate_condition == other.aggregate_condition
            && self.backoff == other.backoff
            && self.throttling_backoff == other.throttling_backoff
    }
}

impl Eq for RetryPolicy {}

impl Hash for RetryPolicy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.aggregate_condition.hash(state);
        self.backoff.hash(state);
        self.throttling_backoff.hash(state);
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug)]
pub struct RetryPolicyBuilder {
    mode: RetryMode,
    num_retries: u32,
    backoff: BackoffStrategy,
    throttling_backoff: BackoffStrategy,
    retry_condition: RetryCondition,
    capacity: Option<Arc<dyn RequestCapacity>>,
}

impl RetryPolicyBuilder {
    fn new(mode: RetryMode) -> Self {
        Self {
            mode,
            num_retries: mode.default_retries(),
            backoff: BackoffStrategy::default_strategy(),
            throttling_backoff: BackoffStrategy::default_throttling_strategy(),
            retry_condition: RetryCondition::default_condition(),
            capacity: None,
        }
    }

    /// Maximum number of retries after the first attempt.
    pub fn num_retries(mut self, num_retries: u32) -> Self {
        self.num_retries = num_retries;
        self
    }

    /// Condition combined with the retry budget into the aggregate.
    pub fn retry_condition(mut self, condition: RetryCondition) -> Self {
        self.retry_condition = condition;
        self
    }

    /// Backoff for non-throttling failures.
    pub fn backoff_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Backoff for throttling failures.
    pub fn throttling_backoff_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.throttling_backoff = strategy;
        self
    }

    /// Admission capacity; defaults to a token bucket sized for the mode.
    pub fn request_capacity(mut self, capacity: Arc<dyn RequestCapacity>) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn build(self) -> RetryPolicy {
        // The retry budget goes first so the user condition is never even
        // consulted past the budget. Capacity-backed conditions, if a
        // caller supplies one, belong at the end of the user condition.
        let aggregate_condition = RetryCondition::and(vec![
            RetryCondition::MaxRetries(self.num_retries),
            self.retry_condition,
        ]);

        let capacity = self
            .capacity
            .unwrap_or_else(|| Arc::new(TokenBucketCapacity::for_mode(self.mode)));

        RetryPolicy {
            mode: self.mode,
            num_retries: self.num_retries,
            backoff: self.backoff,
            throttling_backoff: self.throttling_backoff,
            aggregate_condition,
            capacity,
        }
    }
}
