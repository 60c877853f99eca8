//! Breaker cycle against the real monotonic clock.

use gungnir_core::risk::{BreakerState, CircuitBreaker};
use gungnir_core::time::MonotonicClock;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const MS: u64 = 1_000_000;

#[test]
fn test_three_rejects_open_then_cooldown_recovers() {
    // threshold=3, cooldown=50ms.
    let breaker = CircuitBreaker::new(3, 50 * MS, Arc::new(MonotonicClock::new()));

    breaker.record_failure("reject 1");
    breaker.record_failure("reject 2");
    assert_eq!(breaker.state(), BreakerState::Closed);
    breaker.record_failure("reject 3");
    assert_eq!(breaker.state(), BreakerState::Open);

    // While open, checks fail fast with the trip reason.
    let err = breaker.check_allowed().unwrap_err();
    assert!(err.to_string().contains("reject 3"));

    // After the cooldown the next check transitions to half-open and is
    // allowed through.
    thread::sleep(Duration::from_millis(60));
    assert!(breaker.check_allowed().is_ok());
    assert_eq!(breaker.state(), BreakerState::HalfOpen);

    // A success closes the breaker.
    breaker.record_success();
    assert_eq!(breaker.state(), BreakerState::Closed);
    assert!(breaker.check_allowed().is_ok());
}

#[test]
fn test_half_open_failure_reopens_with_fresh_trip_time() {
    let breaker = CircuitBreaker::new(3, 50 * MS, Arc::new(MonotonicClock::new()));

    for i in 0..3 {
        breaker.record_failure(&format!("reject {i}"));
    }
    assert_eq!(breaker.state(), BreakerState::Open);

    thread::sleep(Duration::from_millis(60));
    assert!(breaker.check_allowed().is_ok());
    assert_eq!(breaker.state(), BreakerState::HalfOpen);

    // The probe fails: immediately open again, cooldown restarted.
    breaker.record_failure("probe failed");
    assert_eq!(breaker.state(), BreakerState::Open);
    assert!(breaker.check_allowed().is_err());

    // Half the cooldown is not enough after the refresh.
    thread::sleep(Duration::from_millis(30));
    assert!(breaker.check_allowed().is_err());

    thread::sleep(Duration::from_millis(30));
    assert!(breaker.check_allowed().is_ok());
    assert_eq!(breaker.state(), BreakerState::HalfOpen);
}

#[test]
fn test_trip_count_accumulates() {
    let breaker = CircuitBreaker::new(1, 10 * MS, Arc::new(MonotonicClock::new()));
    breaker.record_failure("a");
    thread::sleep(Duration::from_millis(15));
    assert!(breaker.check_allowed().is_ok());
    breaker.record_failure("b");
    assert_eq!(breaker.trip_count(), 2);
}
