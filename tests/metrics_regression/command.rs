//! Guarded command metrics regression tests

use super::helpers::*;
use serial_test::serial;
use std::time::Duration;
use tower_hystrix_command::{CommandConfig, Fallback, GuardedCommand};

#[tokio::test]
#[serial]
async fn call_metrics_exist() {
    init_recorder();

    let command = GuardedCommand::<u32, u32, String>::new(
        CommandConfig::builder()
            .command("metrics_cmd")
            .timeout(Duration::from_millis(20))
            .build()
            .unwrap(),
    );

    let _ = command.execute(1, || async { Ok(1) }).await;
    let _ = command.execute(2, || async { Err("Boom".to_string()) }).await;
    let _ = command
        .execute(3, || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(3)
        })
        .await;

    assert_counter_exists("hystrix_command_calls_total");
    for outcome in ["success", "failure", "timeout"] {
        assert_metric_has_labels(
            "hystrix_command_calls_total",
            &[("command", "metrics_cmd"), ("outcome", outcome)],
        );
    }

    assert_histogram_exists("hystrix_command_duration_seconds");
    assert_metric_has_label("hystrix_command_duration_seconds", "command", "metrics_cmd");
}

#[tokio::test]
#[serial]
async fn rejection_and_fallback_outcomes_are_labelled() {
    init_recorder();

    let command = GuardedCommand::<u32, u32, String>::new(
        CommandConfig::builder()
            .command("metrics_fallback")
            .force_open(true)
            .build()
            .unwrap(),
    );

    let _ = command.execute(1, || async { Ok(1) }).await;
    let _ = command
        .execute_with(2, || async { Ok::<u32, String>(2) }, |_| {
            Some(Fallback::value(0))
        })
        .await;
    let _ = command
        .execute_with(
            3,
            || async { Ok::<u32, String>(3) },
            |_| {
                Some(Fallback::<u32, u32, String>::from_fn(|_, _| {
                    Err("Fallback boom".to_string())
                }))
            },
        )
        .await;

    for outcome in ["short_circuited", "fallback_success", "fallback_failure"] {
        assert_metric_has_labels(
            "hystrix_command_calls_total",
            &[("command", "metrics_fallback"), ("outcome", outcome)],
        );
    }
}

#[tokio::test]
#[serial]
async fn semaphore_rejection_is_labelled() {
    init_recorder();

    let command = std::sync::Arc::new(GuardedCommand::<u32, u32, String>::new(
        CommandConfig::builder()
            .command("metrics_semaphore")
            .max_concurrent(1)
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap(),
    ));

    let (release, hold) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn({
        let command = std::sync::Arc::clone(&command);
        async move {
            command
                .execute(1, || async move {
                    let _ = hold.await;
                    Ok(1)
                })
                .await
        }
    });
    while command.snapshot().concurrent_executions == 0 {
        tokio::task::yield_now().await;
    }

    let rejected = command.execute(2, || async { Ok(2) }).await;
    assert!(rejected.unwrap_err().is_rejected());
    let _ = release.send(());
    assert_eq!(running.await.unwrap().unwrap(), 1);

    assert_metric_has_labels(
        "hystrix_command_calls_total",
        &[("command", "metrics_semaphore"), ("outcome", "semaphore_rejected")],
    );
}
