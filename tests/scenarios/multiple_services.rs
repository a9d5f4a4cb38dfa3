use super::{guarded, published, FlakyTransport, Registry};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tower_hystrix_command::{CommandConfig, CommandRegistry};

#[tokio::test(start_paused = true)]
async fn ten_services_publish_ten_records() {
    let registry: Registry = Arc::new(CommandRegistry::new());
    let bridges: Vec<_> = (0..10)
        .map(|i| {
            let config = CommandConfig::builder()
                .command(format!("op{i}"))
                .sleep_window(Duration::from_millis(1000))
                .build()
                .unwrap();
            let transport = FlakyTransport::new(5, Duration::from_millis(100));
            guarded(&registry, config, transport.handler())
        })
        .collect();

    let requests = (0..100).flat_map(|_| {
        bridges
            .iter()
            .map(|bridge| bridge.request("hello".to_string()))
    });
    for reply in join_all(requests).await {
        match reply {
            Ok(reply) => assert_eq!(reply.into_full().unwrap(), "hello"),
            Err(err) => assert_eq!(err.to_string(), "Boom"),
        }
    }

    let records = published(&registry);
    assert_eq!(records.len(), 10);
    for record in &records {
        let error_percentage = record["errorPercentage"].as_u64().unwrap();
        assert!(
            (5..=30).contains(&error_percentage),
            "{}: {error_percentage}%",
            record["name"]
        );
        assert_eq!(record["requestCount"], 100, "{}", record["name"]);
        assert_eq!(record["isCircuitBreakerOpen"], false);
    }

    let mut names: Vec<_> = records
        .iter()
        .map(|record| record["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    let expected: Vec<_> = (0..10).map(|i| format!("op{i}")).collect();
    assert_eq!(names, expected);
}
