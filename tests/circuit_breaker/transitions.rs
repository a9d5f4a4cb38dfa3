use super::{breaker, fail, ms, succeed};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower_hystrix_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, Outcome};

#[tokio::test(start_paused = true)]
async fn stays_closed_below_volume_threshold() {
    let breaker = breaker("below_volume", 10, 50, Duration::from_secs(1));

    fail(&breaker, 9);

    assert_eq!(breaker.state(), CircuitState::Closed);
    assert!(breaker.allow_request());
    assert!(!breaker.snapshot().is_circuit_breaker_open);
}

#[tokio::test(start_paused = true)]
async fn opens_once_volume_and_error_thresholds_are_met() {
    let breaker = breaker("thresholds", 10, 50, Duration::from_secs(1));

    succeed(&breaker, 5);
    fail(&breaker, 4);
    assert_eq!(breaker.state(), CircuitState::Closed, "9 requests is below volume");

    fail(&breaker, 1);
    assert_eq!(breaker.state(), CircuitState::Open, "10 requests at 50% errors");
    assert!(breaker.try_acquire().is_none());
    assert!(breaker.snapshot().is_circuit_breaker_open);
}

#[tokio::test(start_paused = true)]
async fn high_volume_below_error_threshold_stays_closed() {
    let breaker = breaker("low_error_rate", 10, 50, Duration::from_secs(1));

    for i in 0..100 {
        let permit = breaker.try_acquire().unwrap();
        if i % 5 == 0 {
            permit.failure(ms(1));
        } else {
            permit.success(ms(1));
        }
    }

    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.request_count, 100);
    assert_eq!(snapshot.error_percentage, 20);
    assert!(!snapshot.is_circuit_breaker_open);
}

#[tokio::test(start_paused = true)]
async fn timeouts_count_as_errors() {
    let breaker = breaker("timeouts", 4, 50, Duration::from_secs(1));

    for _ in 0..4 {
        breaker.try_acquire().unwrap().timeout(ms(100));
    }

    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.metrics().rolling_count(Outcome::Timeout), 4);
}

#[tokio::test(start_paused = true)]
async fn rejections_are_counted_while_open() {
    let breaker = breaker("rejections", 2, 50, Duration::from_secs(5));
    fail(&breaker, 2);

    for _ in 0..3 {
        assert!(!breaker.allow_request());
        breaker.on_rejection();
    }

    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.counts.get(Outcome::Rejected), 3);
    assert_eq!(snapshot.request_count, 2, "rejections are not requests");
}

#[tokio::test(start_paused = true)]
async fn half_open_trial_success_closes_and_clears_window() {
    let breaker = breaker("recovery", 2, 50, Duration::from_secs(5));
    fail(&breaker, 2);
    assert!(breaker.try_acquire().is_none());

    tokio::time::advance(Duration::from_secs(4)).await;
    assert!(breaker.try_acquire().is_none(), "sleep window not elapsed");

    tokio::time::advance(Duration::from_secs(1)).await;
    let trial = breaker.try_acquire().expect("trial after sleep window");
    assert!(trial.is_trial());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert!(breaker.try_acquire().is_none(), "only one trial at a time");

    trial.success(ms(3));
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert!(!breaker.snapshot().is_circuit_breaker_open);
    assert_eq!(breaker.snapshot().error_count, 0);
}

#[tokio::test(start_paused = true)]
async fn half_open_trial_failure_restarts_sleep_window() {
    let breaker = breaker("relapse", 2, 50, Duration::from_secs(5));
    fail(&breaker, 2);

    tokio::time::advance(Duration::from_secs(5)).await;
    breaker.try_acquire().unwrap().failure(ms(1));
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(breaker.try_acquire().is_none());

    tokio::time::advance(Duration::from_secs(2)).await;
    let trial = breaker.try_acquire().expect("new trial");
    trial.success(ms(1));
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn half_open_trial_timeout_reopens() {
    let breaker = breaker("trial_timeout", 2, 50, Duration::from_secs(1));
    fail(&breaker, 2);

    tokio::time::advance(Duration::from_secs(1)).await;
    breaker.try_acquire().unwrap().timeout(ms(500));
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn dropped_trial_lets_next_request_probe() {
    let breaker = breaker("abandoned", 2, 50, Duration::from_secs(1));
    fail(&breaker, 2);
    tokio::time::advance(Duration::from_secs(1)).await;

    drop(breaker.try_acquire().expect("trial"));
    assert_eq!(breaker.state(), CircuitState::Open);

    let trial = breaker.try_acquire().expect("probe again without waiting");
    trial.success(ms(1));
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn concurrent_probes_admit_exactly_one_trial() {
    let breaker = Arc::new(breaker("concurrent_trial", 2, 50, ms(50)));
    fail(&breaker, 2);
    tokio::time::sleep(ms(60)).await;

    let admitted = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for _ in 0..32 {
        let breaker = Arc::clone(&breaker);
        let admitted = Arc::clone(&admitted);
        handles.push(std::thread::spawn(move || {
            if breaker.allow_request() {
                admitted.fetch_add(1, Ordering::SeqCst);
            } else {
                breaker.on_rejection();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert_eq!(breaker.metrics().rolling_count(Outcome::Rejected), 31);

    breaker.on_success(ms(1));
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn state_transition_callbacks_follow_the_cycle() {
    let transitions = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&transitions);
    let config = CircuitBreakerConfig::builder()
        .command("callbacks")
        .request_volume_threshold(1)
        .error_threshold_percentage(50)
        .sleep_window(Duration::from_secs(1))
        .on_state_transition(move |from, to| seen.lock().unwrap().push((from, to)))
        .build()
        .unwrap();
    let breaker = CircuitBreaker::new(config);

    fail(&breaker, 1);
    tokio::time::advance(Duration::from_secs(1)).await;
    succeed(&breaker, 1);

    assert_eq!(
        *transitions.lock().unwrap(),
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}

#[tokio::test]
async fn reset_closes_and_clears() {
    let breaker = breaker("reset", 2, 50, Duration::from_secs(60));
    fail(&breaker, 2);
    assert!(breaker.is_open());

    breaker.reset();

    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.snapshot().request_count, 0);
    assert!(breaker.allow_request());
}

#[test]
fn allow_request_pairs_with_explicit_outcomes() {
    let breaker: CircuitBreaker = breaker("manual", 3, 50, Duration::from_secs(60));

    for _ in 0..3 {
        assert!(breaker.allow_request());
        breaker.on_failure(ms(2));
    }

    assert!(breaker.is_open());
    assert!(!breaker.allow_request());
}
