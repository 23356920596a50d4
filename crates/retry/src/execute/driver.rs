//! The per-request attempt driver
//!
//! One driver instance serves many concurrent requests; each call to
//! [`RetryDriver::execute`] runs one request's attempt sequence to a
//! terminal outcome. Attempts within a request are strictly sequential; the
//! only suspension point is the backoff sleep, and cancelling the returned
//! future abandons the request promptly, returning any capacity acquired
//! for the in-flight attempt exactly once.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::capacity::request::RequestCapacity;
use crate::error::CallError;
use crate::execute::dispatcher::{AttemptDispatcher, AttemptFailure, NoSkewAdjuster, SkewAdjuster};
use crate::execute::request::{RpcRequest, RpcResponse, INVOCATION_ID_HEADER, RETRY_INFO_HEADER};
use crate::retry::context::AttemptContext;
use crate::retry::policy::RetryPolicy;

/// Terminal result of one request plus summary statistics.
#[derive(Debug)]
pub struct CallOutcome {
    /// The response, or the failure surfaced at the request boundary.
    pub result: Result<RpcResponse, CallError>,
    /// Number of attempts actually dispatched.
    pub attempts: u32,
    /// Total backoff delay imposed across the attempt sequence.
    pub total_backoff: Duration,
}

impl CallOutcome {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> Result<RpcResponse, CallError> {
        self.result
    }
}

/// Drives a request through admission, backoff, dispatch, and retry.
#[derive(Debug)]
pub struct RetryDriver<D> {
    policy: Arc<RetryPolicy>,
    dispatcher: Arc<D>,
    skew_adjuster: Arc<dyn SkewAdjuster>,
    clock_offset_secs: Arc<AtomicI64>,
}

impl<D> Clone for RetryDriver<D> {
    fn clone(&self) -> Self {
        Self {
            policy: Arc::clone(&self.policy),
            dispatcher: Arc::clone(&self.dispatcher),
            skew_adjuster: Arc::clone(&self.skew_adjuster),
            clock_offset_secs: Arc::clone(&self.clock_offset_secs),
        }
    }
}

impl<D: AttemptDispatcher> RetryDriver<D> {
    /// Driver over `policy` dispatching through `dispatcher`.
    pub fn new(policy: Arc<RetryPolicy>, dispatcher: Arc<D>) -> Self {
        Self {
            policy,
            dispatcher,
            skew_adjuster: Arc::new(NoSkewAdjuster),
            clock_offset_secs: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Replace the clock-skew collaborator.
    pub fn with_skew_adjuster(mut self, adjuster: Arc<dyn SkewAdjuster>) -> Self {
        self.skew_adjuster = adjuster;
        self
    }

    /// The client-wide clock offset, updated when skew is detected.
    pub fn clock_offset_secs(&self) -> i64 {
        self.clock_offset_secs.load(Ordering::SeqCst)
    }

    /// Run the request to a terminal success or failure.
    pub async fn execute(&self, request: RpcRequest) -> Result<RpcResponse, CallError> {
        self.execute_with_outcome(request).await.into_result()
    }

    /// Run the request and return the outcome with attempt statistics.
    pub async fn execute_with_outcome(&self, request: RpcRequest) -> CallOutcome {
        let invocation_id = Uuid::new_v4().to_string();
        let capacity = Arc::clone(self.policy.request_capacity());
        let mut context = AttemptContext::new();
        let mut total_backoff = Duration::ZERO;

        loop {
            context.start_attempt();
            let attempt = context.attempt_number();

            if !capacity.should_attempt_request(&mut context) {
                warn!(
                    operation = request.operation(),
                    attempt, "no request capacity exists to make this attempt"
                );
                let failure = CallError::capacity_exceeded(context.last_failure().cloned());
                return CallOutcome {
                    result: Err(failure),
                    attempts: attempt - 1,
                    total_backoff,
                };
            }

            let acquired = match context.last_acquired() {
                Some(acquisition) if attempt > 1 => acquisition.acquired,
                _ => 0,
            };
            let mut guard = AbortGuard::arm(Arc::clone(&capacity), acquired);

            if attempt > 1 {
                let delay = self.backoff_delay(&context);
                context.record_backoff(delay);
                total_backoff += delay;
                debug!(
                    operation = request.operation(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retryable failure detected, backing off"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let attempt_request = self.augment_request(
                &request,
                &context,
                &invocation_id,
                capacity.current_capacity(),
            );
            debug!(operation = request.operation(), attempt, "dispatching attempt");

            let dispatched = self.dispatcher.dispatch(attempt_request).await;
            guard.disarm();

            match dispatched {
                Ok(response) => {
                    capacity.request_succeeded(&context);
                    self.policy.retry_condition().request_succeeded(&context);
                    debug!(
                        operation = request.operation(),
                        attempt,
                        status = response.status(),
                        "attempt succeeded"
                    );
                    return CallOutcome {
                        result: Ok(response),
                        attempts: attempt,
                        total_backoff,
                    };
                }
                Err(AttemptFailure { error: failure, response }) => {
                    // Detection keys off the classified failure; the
                    // magnitude comes from the wire response, when the
                    // service answered at all.
                    if self.skew_adjuster.should_adjust(&failure) {
                        if let Some(response) = &response {
                            let offset = self.skew_adjuster.adjustment_secs(response);
                            self.clock_offset_secs.store(offset, Ordering::SeqCst);
                            debug!(offset_secs = offset, "adjusted shared clock offset");
                        }
                    }

                    let terminal = failure.is_non_retryable();
                    context.record_failure(failure.clone());

                    if terminal {
                        warn!(
                            operation = request.operation(),
                            attempt,
                            error = %failure,
                            "non-retryable failure, giving up"
                        );
                        return CallOutcome {
                            result: Err(failure),
                            attempts: attempt,
                            total_backoff,
                        };
                    }

                    if !self.policy.retry_condition().should_retry(&context) {
                        warn!(
                            operation = request.operation(),
                            attempts = attempt,
                            error = %failure,
                            "retries exhausted, surfacing last failure"
                        );
                        return CallOutcome {
                            result: Err(failure),
                            attempts: attempt,
                            total_backoff,
                        };
                    }
                }
            }
        }
    }

    fn backoff_delay(&self, context: &AttemptContext) -> Duration {
        let throttling =
            context.last_failure().map(|failure| failure.is_throttling()).unwrap_or(false);
        let strategy = if throttling {
            self.policy.throttling_backoff_strategy()
        } else {
            self.policy.backoff_strategy()
        };
        // The delay preceding attempt N is scaled by the N-2 retries that
        // have already completed.
        strategy.delay_before_next_retry(context.attempt_number() - 2)
    }

    fn augment_request(
        &self,
        request: &RpcRequest,
        context: &AttemptContext,
        invocation_id: &str,
        remaining_capacity: Option<u32>,
    ) -> RpcRequest {
        let mut attempt_request = request.clone();
        attempt_request.put_header(INVOCATION_ID_HEADER, invocation_id);
        attempt_request.put_header(RETRY_INFO_HEADER, retry_info(context, remaining_capacity));
        attempt_request
    }
}

/// Value of the retry-info header for the attempt described by `context`.
fn retry_info(context: &AttemptContext, remaining_capacity: Option<u32>) -> String {
    format!(
        "{}/{}/{}",
        context.attempt_number().saturating_sub(1),
        context.last_backoff_delay().as_millis(),
        remaining_capacity.map(|capacity| capacity.to_string()).unwrap_or_default()
    )
}

/// Returns an admitted attempt's capacity if the request is cancelled while
/// the attempt is still in flight.
struct AbortGuard {
    capacity: Arc<dyn RequestCapacity>,
    acquired: u32,
    armed: bool,
}

impl AbortGuard {
    fn arm(capacity: Arc<dyn RequestCapacity>, acquired: u32) -> Self {
        Self { capacity, acquired, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if self.armed {
            self.capacity.attempt_aborted(self.acquired);
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for execute::driver.
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::retry::backoff::BackoffStrategy;
    use crate::retry::mode::RetryMode;

    /// Dispatcher that fails every attempt with the configured failure and
    /// records the requests it saw.
    struct FailingDispatcher {
        failure: CallError,
        response: Option<RpcResponse>,
        calls: AtomicU32,
        seen: Mutex<Vec<RpcRequest>>,
    }

    impl FailingDispatcher {
        fn new(failure: CallError) -> Self {
            Self {
                failure,
                response: None,
                calls: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn with_response(mut self, response: RpcResponse) -> Self {
            self.response = Some(response);
            self
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AttemptDispatcher for FailingDispatcher {
        async fn dispatch(&self, request: RpcRequest) -> Result<RpcResponse, AttemptFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request);
            Err(AttemptFailure { error: self.failure.clone(), response: self.response.clone() })
        }
    }

    fn transient_500() -> CallError {
        CallError::ServiceTransient {
            message: "internal error".to_string(),
            status: Some(500),
            error_code: None,
        }
    }

    fn fast_policy(mode: RetryMode) -> Arc<RetryPolicy> {
        Arc::new(
            RetryPolicy::builder(mode)
                .backoff_strategy(BackoffStrategy::none())
                .throttling_backoff_strategy(BackoffStrategy::none())
                .build(),
        )
    }

    /// Validates the retry-info header carries prior attempts, backoff, and
    /// remaining capacity.
    ///
    /// Assertions:
    /// - Confirms the first attempt reads `0/0/<bucket>`.
    /// - Confirms later attempts count prior attempts and show the drained
    ///   bucket.
    /// - Ensures the invocation id is stable across attempts.
    #[tokio::test]
    async fn test_retry_info_header_progression() {
        let dispatcher = Arc::new(FailingDispatcher::new(transient_500()));
        let driver = RetryDriver::new(fast_policy(RetryMode::Standard), Arc::clone(&dispatcher));

        let outcome = driver.execute_with_outcome(RpcRequest::new("GetThing")).await;
        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 3);

        let seen = dispatcher.seen.lock().unwrap();
        assert_eq!(seen[0].header(RETRY_INFO_HEADER), Some("0/0/500"));
        assert_eq!(seen[1].header(RETRY_INFO_HEADER), Some("1/0/495"));
        assert_eq!(seen[2].header(RETRY_INFO_HEADER), Some("2/0/490"));

        let invocation_id = seen[0].header(INVOCATION_ID_HEADER).unwrap();
        assert!(!invocation_id.is_empty());
        assert!(seen.iter().all(|request| request.header(INVOCATION_ID_HEADER)
            == Some(invocation_id)));
    }

    /// Validates the third header field is empty without a token bucket.
    #[tokio::test]
    async fn test_retry_info_header_without_bucket() {
        let dispatcher = Arc::new(FailingDispatcher::new(transient_500()));
        let driver = RetryDriver::new(Arc::new(RetryPolicy::none()), Arc::clone(&dispatcher));

        let outcome = driver.execute_with_outcome(RpcRequest::new("GetThing")).await;
        assert!(outcome.result.is_err());

        let seen = dispatcher.seen.lock().unwrap();
        assert_eq!(seen[0].header(RETRY_INFO_HEADER), Some("0/0/"));
    }

    /// Validates a non-retryable failure terminates after one attempt even
    /// with retries remaining.
    #[tokio::test]
    async fn test_non_retryable_failure_short_circuits() {
        let dispatcher = Arc::new(FailingDispatcher::new(CallError::client("bad signature")));
        let driver = RetryDriver::new(fast_policy(RetryMode::Legacy), Arc::clone(&dispatcher));

        let outcome = driver.execute_with_outcome(RpcRequest::new("GetThing")).await;

        assert_eq!(dispatcher.calls(), 1);
        assert!(matches!(outcome.result, Err(CallError::Client { .. })));
    }

    /// Skew adjuster that derives its offset from the wire response's
    /// status so tests can prove the response reaches the calculation.
    #[derive(Debug)]
    struct StatusSkew;

    impl SkewAdjuster for StatusSkew {
        fn should_adjust(&self, _failure: &CallError) -> bool {
            true
        }
        fn adjustment_secs(&self, response: &RpcResponse) -> i64 {
            -i64::from(response.status())
        }
    }

    /// Validates clock-skew detection reads the wire response to update the
    /// shared offset.
    #[tokio::test]
    async fn test_skew_adjustment_reads_response() {
        let dispatcher = Arc::new(
            FailingDispatcher::new(CallError::client("skewed"))
                .with_response(RpcResponse::new(403)),
        );
        let driver = RetryDriver::new(fast_policy(RetryMode::Legacy), dispatcher)
            .with_skew_adjuster(Arc::new(StatusSkew));

        let _ = driver.execute(RpcRequest::new("GetThing")).await;
        assert_eq!(driver.clock_offset_secs(), -403);
    }

    /// Validates a transport failure with no wire response leaves the
    /// offset untouched even when detection fires.
    #[tokio::test]
    async fn test_skew_adjustment_skipped_without_response() {
        let dispatcher = Arc::new(FailingDispatcher::new(CallError::client("skewed")));
        let driver = RetryDriver::new(fast_policy(RetryMode::Legacy), dispatcher)
            .with_skew_adjuster(Arc::new(StatusSkew));

        let _ = driver.execute(RpcRequest::new("GetThing")).await;
        assert_eq!(driver.clock_offset_secs(), 0);
    }
}
