// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for retries composed with circuit breaking.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tick::ClockControl;
use tripwire::{
    BreakerConfig, CircuitState, Fault, FaultKind, KindSet, Recovery, RecoveryKind, Resilience, ResilienceContext, ResilienceError,
    RetryPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Unavailable,
    BadRequest,
}

impl FaultKind for Kind {
    fn name(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::BadRequest => "bad_request",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("upstream error")]
struct UpstreamError(Kind);

impl Fault for UpstreamError {
    type Kind = Kind;

    fn kind(&self) -> Kind {
        self.0
    }
}

fn quick_policy(max_attempts: u32) -> RetryPolicy<Kind> {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .wait_min(Duration::from_millis(10))
        .wait_max(Duration::from_millis(100))
        .never_retry(KindSet::of([Kind::BadRequest]))
        .build()
        .unwrap()
}

fn circuit(threshold: u32) -> BreakerConfig<Kind> {
    BreakerConfig::builder()
        .threshold(threshold)
        .ttl(Duration::from_secs(30))
        .exclude(KindSet::of([Kind::BadRequest]))
        .build()
        .unwrap()
}

#[tokio::test]
async fn circuit_opening_mid_retry_stops_the_loop() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();
    let resilience = Resilience::in_memory(&ResilienceContext::new(&clock));
    let calls = AtomicU32::new(0);

    let error = resilience
        .execute("inventory", &quick_policy(10), &circuit(3), || async {
            calls.fetch_add(1, Ordering::Relaxed);
            Err::<(), _>(UpstreamError(Kind::Unavailable))
        })
        .await
        .unwrap_err();

    let ResilienceError::CircuitOpen(open) = &error else {
        panic!("expected an open circuit, got {error:?}");
    };
    assert_eq!(open.name(), "inventory");
    assert!(open.retry_in() <= Duration::from_secs(30));
    assert_eq!(error.recovery().kind(), RecoveryKind::Unavailable);
    assert_eq!(calls.load(Ordering::Relaxed), 3);
}

#[tokio::test]
async fn open_circuit_rejects_without_calling() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();
    let resilience = Resilience::in_memory(&ResilienceContext::new(&clock));
    let calls = AtomicU32::new(0);

    let _ = resilience
        .execute("inventory", &quick_policy(1), &circuit(1), || async {
            Err::<(), _>(UpstreamError(Kind::Unavailable))
        })
        .await;

    let result = resilience
        .execute("inventory", &quick_policy(5), &circuit(1), || async {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok::<_, UpstreamError>(())
        })
        .await;

    assert!(result.unwrap_err().is_circuit_open());
    assert_eq!(calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn transient_failures_recover_within_budget() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();
    let resilience = Resilience::in_memory(&ResilienceContext::new(&clock));
    let calls = AtomicU32::new(0);

    let value = resilience
        .execute("inventory", &quick_policy(4), &circuit(5), || async {
            if calls.fetch_add(1, Ordering::Relaxed) < 3 {
                Err(UpstreamError(Kind::Unavailable))
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 42);

    let breaker = resilience.registry().get_breaker("inventory");
    assert_eq!(breaker.state().await.unwrap(), CircuitState::Closed);
    assert_eq!(breaker.record().await.unwrap().consecutive_failures, 0);
}

#[tokio::test]
async fn caller_errors_are_neither_retried_nor_counted() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();
    let resilience = Resilience::in_memory(&ResilienceContext::new(&clock));
    let calls = AtomicU32::new(0);

    for _ in 0..5 {
        let result = resilience
            .execute("inventory", &quick_policy(3), &circuit(2), || async {
                calls.fetch_add(1, Ordering::Relaxed);
                Err::<(), _>(UpstreamError(Kind::BadRequest))
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::Operation(UpstreamError(Kind::BadRequest)))));
    }

    assert_eq!(calls.load(Ordering::Relaxed), 5);
    let breaker = resilience.registry().get_breaker("inventory");
    assert_eq!(breaker.state().await.unwrap(), CircuitState::Closed);
}

#[tokio::test]
async fn observer_sees_retries_until_the_circuit_opens() {
    let clock = ClockControl::default().auto_advance_timers(true).to_clock();
    let resilience = Resilience::in_memory(&ResilienceContext::new(&clock));
    let mut observed = Vec::new();

    let error = resilience
        .execute_with(
            "inventory",
            &quick_policy(10),
            &circuit(2),
            || async { Err::<(), _>(UpstreamError(Kind::Unavailable)) },
            |args| observed.push((args.attempt().number(), args.error().is_circuit_open())),
        )
        .await
        .unwrap_err();

    assert!(error.is_circuit_open());
    // the rejection ends the run without another notification
    assert_eq!(observed, vec![(1, false), (2, false)]);
}
