// Maps a classified failure to the number of tokens a retry of it costs
use crate::error::CallError;
use crate::retry::mode::{self, RetryMode};

/// Computes the token cost of retrying after a given failure.
///
/// Throttling failures may carry their own cost; every other failure is
/// charged the default. Legacy clients deliberately price throttling at zero
/// so that server back-pressure alone governs throttled retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureCostCalculator {
    throttling_cost: Option<u32>,
    default_cost: u32,
}

impl FailureCostCalculator {
    pub fn builder() -> FailureCostCalculatorBuilder {
        FailureCostCalculatorBuilder::default()
    }

    /// Calculator matching the defaults of `mode`.
    pub fn for_mode(retry_mode: RetryMode) -> Self {
        match retry_mode {
            RetryMode::Legacy => Self {
                throttling_cost: Some(mode::LEGACY_THROTTLING_COST),
                default_cost: mode::DEFAULT_FAILURE_COST,
            },
            RetryMode::Standard => {
                Self { throttling_cost: None, default_cost: mode::DEFAULT_FAILURE_COST }
            }
        }
    }

    /// Cost charged when no dedicated cost applies.
    pub fn default_cost(&self) -> u32 {
        self.default_cost
    }

    /// Token cost of retrying after `failure`.
    pub fn cost(&self, failure: &CallError) -> u32 {
        match self.throttling_cost {
            Some(throttling_cost) if failure.is_throttling() => throttling_cost,
            _ => self.default_cost,
        }
    }
}

/// Builder for [`FailureCostCalculator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureCostCalculatorBuilder {
    throttling_cost: Option<u32>,
    default_cost: Option<u32>,
}

impl FailureCostCalculatorBuilder {
    /// Cost charged for throttling failures instead of the default.
    pub fn throttling_cost(mut self, cost: u32) -> Self {
        self.throttling_cost = Some(cost);
        self
    }

    /// Cost charged for every failure without a dedicated cost.
    pub fn default_cost(mut self, cost: u32) -> Self {
        self.default_cost = Some(cost);
        self
    }

    pub fn build(self) -> FailureCostCalculator {
        FailureCostCalculator {
            throttling_cost: self.throttling_cost,
            default_cost: self.default_cost.unwrap_or(mode::DEFAULT_FAILURE_COST),
        }
    }
}
