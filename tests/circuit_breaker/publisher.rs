use super::ms;
use std::sync::Arc;
use std::time::Duration;
use tower_hystrix_circuitbreaker::{
    sse_frame, CircuitBreakerConfig, CircuitRegistry, CommandRecord, MetricsPublisher,
};

fn registry_with(commands: usize) -> Arc<CircuitRegistry> {
    let registry = Arc::new(CircuitRegistry::new());
    for i in 0..commands {
        let config = CircuitBreakerConfig::builder()
            .command(format!("command_{i}"))
            .group("publisher")
            .build()
            .unwrap();
        registry.get_or_create(&config);
    }
    registry
}

#[tokio::test]
async fn publishes_one_record_per_command() {
    let registry = registry_with(10);
    let publisher = MetricsPublisher::new(Arc::clone(&registry));
    let mut rx = publisher.subscribe();

    assert_eq!(publisher.publish(), 10);

    let mut names = Vec::new();
    for _ in 0..10 {
        let record: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(record["type"], "HystrixCommand");
        assert_eq!(record["group"], "publisher");
        names.push(record["name"].as_str().unwrap().to_string());
    }
    names.sort();
    let expected: Vec<String> = (0..10).map(|i| format!("command_{i}")).collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn record_reflects_the_snapshot() {
    let registry = registry_with(1);
    let breaker = registry.get("command_0").unwrap();
    for i in 0..10 {
        let permit = breaker.try_acquire().unwrap();
        if i < 4 {
            permit.success(ms(10));
        } else {
            permit.failure(ms(20));
        }
    }

    let record = CommandRecord::capture(&breaker);
    assert_eq!(record.request_count, 10);
    assert_eq!(record.error_count, 6);
    assert_eq!(record.error_percentage, 60);
    assert_eq!(record.rolling_count_success, 4);
    assert_eq!(record.rolling_count_failure, 6);
    assert!(record.is_circuit_breaker_open);
    assert_eq!(record.latency_execute.p100, 20);

    let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
    assert_eq!(json["requestCount"], 10);
    assert_eq!(json["errorPercentage"], 60);
    assert_eq!(json["isCircuitBreakerOpen"], true);
    assert_eq!(json["latencyExecute"]["100"], 20);
    assert_eq!(json["latencyExecute"]["99.5"], 20);
    assert_eq!(json["propertyValue_circuitBreakerRequestVolumeThreshold"], 10);
}

#[test]
fn sse_frame_wraps_a_record() {
    assert_eq!(sse_frame("{\"a\":1}"), "data: {\"a\":1}\n\n");
}

#[tokio::test(start_paused = true)]
async fn periodic_publication_follows_the_interval() {
    let registry = registry_with(2);
    let publisher = MetricsPublisher::builder(Arc::clone(&registry))
        .interval(Duration::from_secs(1))
        .build()
        .unwrap();
    let mut rx = publisher.subscribe();

    publisher.start();
    assert!(publisher.is_running());
    assert!(
        tokio::time::timeout(ms(900), rx.recv()).await.is_err(),
        "nothing before the first interval"
    );

    for _ in 0..2 {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("record after one interval")
            .unwrap();
    }

    publisher.stop();
    tokio::task::yield_now().await;
    assert!(!publisher.is_running());
}

#[test]
fn zero_interval_is_rejected() {
    let err = MetricsPublisher::builder(registry_with(0))
        .interval(Duration::ZERO)
        .build()
        .unwrap_err();
    assert!(!err.is_missing_command());
}
