// Backoff selection between attempts: full-jitter exponential delays
use std::time::Duration;

use rand::Rng;

/// Base delay of the default backoff.
pub const BASE_DELAY: Duration = Duration::from_millis(100);

/// Base delay of the throttling backoff.
pub const THROTTLED_BASE_DELAY: Duration = Duration::from_millis(500);

/// Ceiling on any computed backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(20);

/// Maximum exponent for the exponential calculation to prevent overflow
pub const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Computes the delay imposed before the next retry attempt.
///
/// The full-jitter variant draws uniformly from zero to the exponential
/// ceiling, which spreads concurrent retries apart instead of synchronising
/// them. The policy selects the throttling variant when the failure being
/// retried was classified as throttling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BackoffStrategy {
    /// No delay at all.
    None,
    /// `rand(0 ..= min(max_backoff, base_delay * 2^retries_attempted))`.
    FullJitter { base_delay: Duration, max_backoff: Duration },
}

impl BackoffStrategy {
    /// The default backoff for non-throttling failures.
    pub fn default_strategy() -> Self {
        Self::FullJitter { base_delay: BASE_DELAY, max_backoff: MAX_BACKOFF }
    }

    /// The default backoff for throttling failures.
    pub fn default_throttling_strategy() -> Self {
        Self::FullJitter { base_delay: THROTTLED_BASE_DELAY, max_backoff: MAX_BACKOFF }
    }

    /// A strategy that never delays.
    pub fn none() -> Self {
        Self::None
    }

    /// Delay before the retry following `retries_attempted` completed
    /// retries.
    pub fn delay_before_next_retry(&self, retries_attempted: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::FullJitter { base_delay, max_backoff } => {
                let ceiling = Self::exponential_ceiling(*base_delay, *max_backoff, retries_attempted);
                let millis = rand::thread_rng().gen_range(0..=ceiling.as_millis() as u64);
                Duration::from_millis(millis)
            }
        }
    }

    fn exponential_ceiling(base_delay: Duration, max_backoff: Duration, retries: u32) -> Duration {
        let multiplier = 2_u64.saturating_pow(retries.min(MAX_BACKOFF_EXPONENT));
        let millis = (base_delay.as_millis() as u64)
            .saturating_mul(multiplier)
            .min(max_backoff.as_millis() as u64);
        Duration::from_millis(millis)
    }
}
