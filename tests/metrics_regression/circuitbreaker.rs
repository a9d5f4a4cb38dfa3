//! Circuit breaker metrics regression tests

use super::helpers::*;
use serial_test::serial;
use std::time::Duration;
use tower_hystrix_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};

fn breaker(command: &str) -> CircuitBreaker {
    CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .command(command)
            .request_volume_threshold(2)
            .error_threshold_percentage(50)
            .sleep_window(Duration::from_millis(20))
            .build()
            .unwrap(),
    )
}

#[tokio::test]
#[serial]
async fn transition_metrics_exist() {
    init_recorder();
    let breaker = breaker("metrics_cb");

    breaker.on_failure(Duration::from_millis(1));
    breaker.on_failure(Duration::from_millis(1));
    assert!(breaker.is_open());

    assert_counter_exists("hystrix_circuit_transitions_total");
    assert_metric_has_labels(
        "hystrix_circuit_transitions_total",
        &[("command", "metrics_cb"), ("from", "closed"), ("to", "open")],
    );

    assert_gauge_exists("hystrix_circuit_state");
    assert_metric_has_label("hystrix_circuit_state", "command", "metrics_cb");
}

#[tokio::test]
#[serial]
async fn recovery_transitions_are_labelled() {
    init_recorder();
    let breaker = breaker("metrics_recovery");

    breaker.on_failure(Duration::from_millis(1));
    breaker.on_failure(Duration::from_millis(1));
    tokio::time::sleep(Duration::from_millis(30)).await;

    let trial = breaker.try_acquire().expect("sleep window elapsed");
    assert!(trial.is_trial());
    trial.success(Duration::from_millis(1));

    assert_metric_has_labels(
        "hystrix_circuit_transitions_total",
        &[("command", "metrics_recovery"), ("from", "open"), ("to", "half_open")],
    );
    assert_metric_has_labels(
        "hystrix_circuit_transitions_total",
        &[("command", "metrics_recovery"), ("from", "half_open"), ("to", "closed")],
    );
}
