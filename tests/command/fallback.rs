use super::builder;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower_hystrix_circuitbreaker::Outcome;
use tower_hystrix_command::{CommandError, ErrorKind, Fallback, GuardedCommand};

#[tokio::test]
async fn fallback_receives_error_and_request() {
    let seen = Arc::new(Mutex::new(None));
    let record = Arc::clone(&seen);
    let command = GuardedCommand::new(
        builder("recorded")
            .fallback(Fallback::from_fn(move |err: &CommandError<String>, req: &String| {
                *record.lock().unwrap() = Some((err.to_string(), req.clone()));
                Ok(format!("fallback for {req}"))
            }))
            .build()
            .unwrap(),
    );

    let reply = command
        .execute("hello".to_string(), || async { Err::<String, _>("Boom".to_string()) })
        .await;

    assert_eq!(reply.unwrap(), "fallback for hello");
    assert_eq!(
        seen.lock().unwrap().clone(),
        Some(("Boom".to_string(), "hello".to_string()))
    );
}

#[tokio::test]
async fn failing_fallback_surfaces_its_own_error() {
    let command = GuardedCommand::new(
        builder("fallback_boom")
            .fallback_fn(|_, _| async { Err("Fallback boom".to_string()) })
            .build()
            .unwrap(),
    );

    let err = command
        .execute("hello".to_string(), || async { Err::<String, _>("Boom".to_string()) })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Fallback);
    assert_eq!(err.to_string(), "Fallback boom");
    assert_eq!(command.snapshot().counts.get(Outcome::FallbackFailure), 1);
}

#[tokio::test]
async fn fallback_replaces_open_circuit() {
    let command = GuardedCommand::new(
        builder("open_fallback")
            .force_open(true)
            .fallback_fn(|err, _| async move { Ok(format!("degraded: {err}")) })
            .build()
            .unwrap(),
    );

    let reply = command
        .execute("hello".to_string(), || async { Ok("live".to_string()) })
        .await;

    assert_eq!(reply.unwrap(), "degraded: OpenCircuitError");
    let counts = command.snapshot().counts;
    assert_eq!(counts.get(Outcome::Rejected), 1);
    assert_eq!(counts.get(Outcome::FallbackSuccess), 1);
}

#[tokio::test(start_paused = true)]
async fn fallback_replaces_timeout() {
    let command = GuardedCommand::new(
        builder("timeout_fallback")
            .timeout(Duration::from_millis(20))
            .fallback_fn(|err, _| async move { Ok(err.to_string()) })
            .build()
            .unwrap(),
    );

    let reply = command
        .execute("hello".to_string(), || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok("late".to_string())
        })
        .await;

    assert_eq!(reply.unwrap(), "CommandTimeOut");
}

#[tokio::test]
async fn caller_selected_fallback_overrides_configured() {
    let command = GuardedCommand::new(
        builder("selected")
            .fallback(Fallback::value("configured".to_string()))
            .build()
            .unwrap(),
    );
    let override_fallback = Fallback::value("override".to_string());

    let reply: Result<String, _> = command
        .execute_with(
            "hello".to_string(),
            || async { Err::<String, _>("Boom".to_string()) },
            |configured| {
                assert!(configured.is_some());
                Some(override_fallback)
            },
        )
        .await;
    assert_eq!(reply.unwrap(), "override");

    let err = command
        .execute_with(
            "hello".to_string(),
            || async { Err::<String, _>("Boom".to_string()) },
            |_| None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Boom");
}

#[tokio::test]
async fn fallback_observer_reports_result() {
    let results = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&results);
    let command = GuardedCommand::new(
        builder("fallback_observer")
            .fallback_fn(|_, req: String| async move {
                if req == "ok" {
                    Ok("fallback".to_string())
                } else {
                    Err("nope".to_string())
                }
            })
            .on_fallback(move |succeeded| seen.lock().unwrap().push(succeeded))
            .build()
            .unwrap(),
    );

    for req in ["ok", "bad"] {
        let _ = command
            .execute(req.to_string(), || async { Err::<String, _>("Boom".to_string()) })
            .await;
    }

    assert_eq!(*results.lock().unwrap(), vec![true, false]);
}
