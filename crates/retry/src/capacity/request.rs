//! Admission control for retry attempts
//!
//! Admission is decided before a retry is dispatched and is independent of
//! the post-response retry classification: a retry that every condition
//! would allow can still be refused because the client as a whole has spent
//! too much capacity on failures recently.

use std::fmt;

use crate::capacity::atomic::AtomicCapacity;
use crate::capacity::cost::FailureCostCalculator;
use crate::retry::context::AttemptContext;
use crate::retry::mode::{self, RetryMode};

/// Per-attempt admission policy shared by all requests of one client.
///
/// First attempts are always admitted without consulting any shared state;
/// only retries are subject to admission.
pub trait RequestCapacity: fmt::Debug + Send + Sync {
    /// Whether the attempt described by `context` may be dispatched.
    ///
    /// Implementations that acquire shared capacity record the acquisition
    /// in the context so a later success can return it.
    fn should_attempt_request(&self, context: &mut AttemptContext) -> bool;

    /// Hook invoked when the request terminates successfully.
    fn request_succeeded(&self, _context: &AttemptContext) {}

    /// Hook invoked when an admitted attempt is abandoned by cancellation.
    ///
    /// `acquired` is the amount recorded at admission; it must be returned
    /// exactly once.
    fn attempt_aborted(&self, _acquired: u32) {}

    /// Remaining shared capacity, when this policy is backed by a bucket.
    fn current_capacity(&self) -> Option<u32> {
        None
    }
}

/// Token-bucket admission: failures drain a shared bucket, successes refill
/// it.
///
/// Attempt 1 is free. Every later attempt must acquire the cost of the
/// failure it is retrying; a bucket that cannot cover the cost refuses
/// admission and is left untouched. A success releases what its attempt
/// acquired, or credits a single token when the request never needed a
/// retry.
#[derive(Debug)]
pub struct TokenBucketCapacity {
    bucket: AtomicCapacity,
    costs: FailureCostCalculator,
}

impl TokenBucketCapacity {
    pub fn builder() -> TokenBucketCapacityBuilder {
        TokenBucketCapacityBuilder::default()
    }

    /// Bucket sized and priced per the defaults of `retry_mode`.
    pub fn for_mode(retry_mode: RetryMode) -> Self {
        Self {
            bucket: AtomicCapacity::new(mode::TOKEN_BUCKET_SIZE),
            costs: FailureCostCalculator::for_mode(retry_mode),
        }
    }
}

impl RequestCapacity for TokenBucketCapacity {
    fn should_attempt_request(&self, context: &mut AttemptContext) -> bool {
        if context.attempt_number() == 1 {
            return true;
        }

        // A retry without a recorded failure cannot happen through the
        // driver; price it like any non-throttling failure.
        let cost = match context.last_failure() {
            Some(failure) => self.costs.cost(failure),
            None => self.costs.default_cost(),
        };

        match self.bucket.try_acquire(cost) {
            Some(acquisition) => {
                context.record_acquisition(Some(acquisition));
                true
            }
            None => false,
        }
    }

    fn request_succeeded(&self, context: &AttemptContext) {
        match context.last_acquired() {
            Some(acquisition) if acquisition.acquired > 0 => {
                self.bucket.release(acquisition.acquired);
            }
            // A retry-free success earns the client a single token back.
            _ => self.bucket.release(1),
        }
    }

    fn attempt_aborted(&self, acquired: u32) {
        self.bucket.release(acquired);
    }

    fn current_capacity(&self) -> Option<u32> {
        Some(self.bucket.current_capacity())
    }
}

/// Builder for [`TokenBucketCapacity`].
#[derive(Debug, Default)]
pub struct TokenBucketCapacityBuilder {
    bucket_size: Option<u32>,
    costs: Option<FailureCostCalculator>,
}

impl TokenBucketCapacityBuilder {
    /// Maximum number of tokens the bucket holds.
    pub fn bucket_size(mut self, size: u32) -> Self {
        self.bucket_size = Some(size);
        self
    }

    /// Calculator pricing each failure kind.
    pub fn cost_calculator(mut self, costs: FailureCostCalculator) -> Self {
        self.costs = Some(costs);
        self
    }

    pub fn build(self) -> TokenBucketCapacity {
        TokenBucketCapacity {
            bucket: AtomicCapacity::new(self.bucket_size.unwrap_or(mode::TOKEN_BUCKET_SIZE)),
            costs: self.costs.unwrap_or_else(|| FailureCostCalculator::builder().build()),
        }
    }
}

/// Admission policy that admits everything and tracks nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlimitedCapacity;

impl RequestCapacity for UnlimitedCapacity {
    fn should_attempt_request(&self, _context: &mut AttemptContext) -> bool {
        true
    }
}
