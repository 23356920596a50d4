//! Integration tests for the capacity subsystem
//!
//! Exercises the lock-free cell and the token-bucket admission policy
//! through the public API, including the bounded-concurrency property.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use relay_retry::{
    AtomicCapacity, AttemptContext, CallError, FailureCostCalculator, RequestCapacity, RetryMode,
    TokenBucketCapacity,
};

fn transient_failure() -> CallError {
    CallError::ServiceTransient {
        message: "internal error".to_string(),
        status: Some(500),
        error_code: None,
    }
}

fn throttling_failure() -> CallError {
    CallError::Throttling {
        message: "too many requests".to_string(),
        status: Some(429),
        error_code: None,
    }
}

/// Validates the cell invariant across arbitrary acquire/release sequences.
///
/// For every observation `0 <= current <= max`, and a full round trip
/// restores the starting value.
#[test]
fn test_cell_invariant_over_sequences() {
    let max = 64;
    let cell = AtomicCapacity::new(max);

    let amounts = [1_u32, 3, 0, 7, 64, 13, 2, 0, 5, 31];
    let mut outstanding: Vec<u32> = Vec::new();

    for round in 0..100 {
        let amount = amounts[round % amounts.len()];
        if round % 3 == 0 {
            if let Some(acquisition) = cell.try_acquire(amount) {
                assert_eq!(acquisition.acquired, amount);
                outstanding.push(acquisition.acquired);
            }
        } else if let Some(acquired) = outstanding.pop() {
            cell.release(acquired);
        }
        assert!(cell.current_capacity() <= max);
    }

    for acquired in outstanding.drain(..) {
        cell.release(acquired);
    }
    assert_eq!(cell.current_capacity(), max);
}

/// Validates first-attempt admission leaves the bucket bit-identical.
#[test]
fn test_first_attempt_admission_is_observation_free() {
    let capacity = TokenBucketCapacity::for_mode(RetryMode::Standard);

    for _ in 0..25 {
        let mut context = AttemptContext::for_attempt(1, None);
        assert!(capacity.should_attempt_request(&mut context));
        assert_eq!(capacity.current_capacity(), Some(500));
        assert!(context.last_acquired().is_none());
    }
}

/// Validates a default-priced bucket of 500 admits exactly 100 retries.
///
/// Each non-first attempt costs 5, so the standard-mode bucket admits 100
/// throttled retries across the client before refusing.
#[test]
fn test_standard_bucket_admits_one_hundred_retries() {
    let capacity = TokenBucketCapacity::for_mode(RetryMode::Standard);

    let mut admitted = 0;
    loop {
        let mut context = AttemptContext::for_attempt(2, Some(throttling_failure()));
        if !capacity.should_attempt_request(&mut context) {
            break;
        }
        admitted += 1;
        assert!(admitted <= 100, "bucket admitted more than its capacity allows");
    }

    assert_eq!(admitted, 100);
    assert_eq!(capacity.current_capacity(), Some(0));
}

/// Validates the legacy pricing never drains the bucket on throttling.
#[test]
fn test_legacy_bucket_ignores_throttling() {
    let capacity = TokenBucketCapacity::for_mode(RetryMode::Legacy);

    for _ in 0..10_000 {
        let mut context = AttemptContext::for_attempt(2, Some(throttling_failure()));
        assert!(capacity.should_attempt_request(&mut context));
    }

    assert_eq!(capacity.current_capacity(), Some(500));
}

/// Validates the released amount matches the acquisition round for round.
#[test]
fn test_success_release_matches_acquisition() {
    let capacity = TokenBucketCapacity::for_mode(RetryMode::Standard);

    let mut context = AttemptContext::for_attempt(2, Some(transient_failure()));
    assert!(capacity.should_attempt_request(&mut context));
    let acquisition = context.last_acquired().unwrap();
    assert_eq!(acquisition.acquired, 5);
    assert_eq!(capacity.current_capacity(), Some(495));

    capacity.request_succeeded(&context);
    assert_eq!(capacity.current_capacity(), Some(500));
}

/// Tests the bucket bounds simultaneous admissions under parallel load.
///
/// Bucket size B with unit costs, 2B worker threads, 1000 cycles each: the
/// number of concurrently admitted retries never exceeds B and the run
/// finishes without underflow.
#[test]
fn test_bucket_bounds_concurrent_admissions() {
    let bucket_size = 5;
    let capacity = Arc::new(
        TokenBucketCapacity::builder()
            .bucket_size(bucket_size)
            .cost_calculator(FailureCostCalculator::builder().default_cost(1).build())
            .build(),
    );
    let concurrent = Arc::new(AtomicI32::new(0));
    let violated = Arc::new(AtomicBool::new(false));

    let mut handles = vec![];
    for _ in 0..(bucket_size * 2) {
        let capacity = Arc::clone(&capacity);
        let concurrent = Arc::clone(&concurrent);
        let violated = Arc::clone(&violated);
        handles.push(thread::spawn(move || {
            for _ in 0..1000 {
                let mut context = AttemptContext::for_attempt(2, Some(transient_failure()));
                if capacity.should_attempt_request(&mut context) {
                    let admitted = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                    if admitted > bucket_size as i32 {
                        violated.store(true, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(1));
                    concurrent.fetch_sub(1, Ordering::SeqCst);
                    capacity.request_succeeded(&context);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(!violated.load(Ordering::SeqCst));
    let remaining = capacity.current_capacity().unwrap();
    assert!(remaining <= bucket_size);
}
