//! Per-request attempt state
//!
//! One [`AttemptContext`] exists per in-flight request. The driver is the
//! only writer; conditions and capacities read it, except that an admission
//! check records the capacity it acquired so a later success can return it.

use std::time::Duration;

use crate::capacity::atomic::Acquisition;
use crate::error::CallError;

/// Mutable state of one request's attempt sequence.
#[derive(Debug, Clone, Default)]
pub struct AttemptContext {
    attempt_number: u32,
    last_failure: Option<CallError>,
    last_status: Option<u16>,
    last_backoff_delay: Duration,
    last_acquired: Option<Acquisition>,
}

impl AttemptContext {
    /// Context for a request that has not attempted anything yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context as a capacity or condition implementation observes it
    /// mid-request: `attempt_number` started, `last_failure` recorded.
    pub fn for_attempt(attempt_number: u32, last_failure: Option<CallError>) -> Self {
        Self {
            attempt_number,
            last_status: last_failure.as_ref().and_then(CallError::status),
            last_failure,
            last_backoff_delay: Duration::ZERO,
            last_acquired: None,
        }
    }

    /// Current attempt number; zero before the first attempt starts.
    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    /// Number of retries attempted so far, i.e. completed attempts beyond
    /// the first.
    pub fn retries_attempted(&self) -> u32 {
        self.attempt_number.saturating_sub(1)
    }

    /// Failure recorded by the most recent completed attempt.
    pub fn last_failure(&self) -> Option<&CallError> {
        self.last_failure.as_ref()
    }

    /// HTTP status of the most recent failure, when one was observed.
    pub fn last_status(&self) -> Option<u16> {
        self.last_status
    }

    /// Backoff delay imposed before the current attempt.
    pub fn last_backoff_delay(&self) -> Duration {
        self.last_backoff_delay
    }

    /// Capacity acquired by the most recent admission check.
    pub fn last_acquired(&self) -> Option<Acquisition> {
        self.last_acquired
    }

    /// Record the capacity acquired (or cleared) by an admission check.
    pub fn record_acquisition(&mut self, acquisition: Option<Acquisition>) {
        self.last_acquired = acquisition;
    }

    pub(crate) fn start_attempt(&mut self) {
        self.attempt_number += 1;
    }

    pub(crate) fn record_failure(&mut self, failure: CallError) {
        self.last_status = failure.status();
        self.last_failure = Some(failure);
    }

    pub(crate) fn record_backoff(&mut self, delay: Duration) {
        self.last_backoff_delay = delay;
    }
}
