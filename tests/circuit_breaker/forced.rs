use super::{breaker, fail, ms, succeed};
use std::sync::Arc;
use std::time::Duration;
use tower_hystrix_circuitbreaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitRegistry, CircuitState,
};

#[test]
fn forced_open_rejects_a_healthy_circuit() {
    let breaker = breaker("forced_open", 10, 50, Duration::from_secs(1));
    succeed(&breaker, 5);

    breaker.force_open(true);
    assert!(breaker.is_open());
    assert!(breaker.try_acquire().is_none());
    assert!(breaker.snapshot().is_circuit_breaker_open);
    assert_eq!(breaker.state(), CircuitState::Closed, "computed state is untouched");

    breaker.force_open(false);
    assert!(breaker.allow_request());
}

#[test]
fn forced_closed_admits_everything_and_suspends_opening() {
    let breaker = breaker("forced_closed", 2, 50, Duration::from_secs(60));
    breaker.force_closed(true);

    fail(&breaker, 20);
    assert!(!breaker.is_open());
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.snapshot().error_percentage, 100);
}

#[test]
fn forced_closed_overrides_an_open_circuit() {
    let breaker = breaker("forced_closed_open", 2, 50, Duration::from_secs(60));
    fail(&breaker, 2);
    assert!(breaker.try_acquire().is_none());

    breaker.force_closed(true);
    assert!(!breaker.snapshot().is_circuit_breaker_open);
    succeed(&breaker, 3);

    breaker.force_closed(false);
    assert!(breaker.is_open(), "the computed state resumes once the flag clears");
}

#[test]
fn clearing_forced_closed_reevaluates_the_window() {
    let breaker = breaker("reevaluate", 4, 50, Duration::from_secs(60));
    breaker.force_closed(true);
    fail(&breaker, 4);
    assert_eq!(breaker.state(), CircuitState::Closed);

    breaker.force_closed(false);
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[test]
fn forced_open_wins_over_forced_closed() {
    let config = CircuitBreakerConfig::builder()
        .command("both_flags")
        .force_open(true)
        .force_closed(true)
        .build()
        .unwrap();
    let breaker = CircuitBreaker::new(config);

    assert!(breaker.is_forced_open());
    assert!(breaker.is_forced_closed());
    assert!(!breaker.allow_request());
}

#[test]
fn reset_restores_configured_flags() {
    let config = CircuitBreakerConfig::builder()
        .command("configured_flags")
        .force_closed(true)
        .build()
        .unwrap();
    let breaker = CircuitBreaker::new(config);

    breaker.force_closed(false);
    breaker.force_open(true);
    breaker.reset();

    assert!(!breaker.is_forced_open());
    assert!(breaker.is_forced_closed());
}

#[test]
fn registry_forces_by_command_name() {
    let registry = Arc::new(CircuitRegistry::new());
    let config = CircuitBreakerConfig::builder()
        .command("admin")
        .build()
        .unwrap();
    let breaker = registry.get_or_create(&config);

    assert!(registry.force_open("admin", true));
    assert!(!registry.force_open("unknown", true));
    assert!(registry.snapshot("admin").unwrap().is_circuit_breaker_open);

    assert!(registry.force_open("admin", false));
    assert!(registry.force_closed("admin", true));
    breaker.try_acquire().unwrap().failure(ms(1));
    assert!(!breaker.is_open());
}
