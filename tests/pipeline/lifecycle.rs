use super::{config, registry, Res};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, ServiceExt};
use tower_hystrix_command::{CommandError, ErrorKind, Fallback};
use tower_hystrix_pipeline::{handler_fn, PipelineLayer, RequestContext, ServiceHandler};

#[tokio::test(start_paused = true)]
async fn silent_handler_is_bounded_by_the_timeout() {
    let bridge = PipelineLayer::new(
        registry(),
        config("silent")
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap(),
    )
    .layer(handler_fn(|_req: String, res: Res| async move {
        drop(res);
    }));

    let err = bridge.request("ping".to_string()).await.unwrap_err();
    assert_eq!(err.to_string(), "CommandTimeOut");
    assert_eq!(bridge.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_handler_times_out_into_fallback() {
    let bridge = PipelineLayer::new(
        registry(),
        config("slow")
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap(),
    )
    .fallback(Fallback::new(|err: CommandError<String>, _req: String| async move {
        Ok(format!("fallback after {err}"))
    }))
    .layer(handler_fn(|req: String, res: Res| async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        res.respond(req);
    }));

    let reply = bridge.request("ping".to_string()).await.unwrap();
    assert_eq!(reply.into_full().unwrap(), "fallback after CommandTimeOut");
}

#[tokio::test]
async fn repeated_requests_leave_nothing_behind() {
    let bridge = PipelineLayer::new(registry(), config("no_leaks").build().unwrap())
        .fallback(Fallback::value("fallback".to_string()))
        .layer(handler_fn(|req: String, res: Res| async move {
            if req.ends_with('0') {
                res.throw("Boom".to_string());
            } else {
                res.respond(req);
            }
        }));

    for i in 0..200 {
        let reply = bridge.request(format!("req{i}")).await.unwrap();
        let expected = if i % 10 == 0 {
            "fallback".to_string()
        } else {
            format!("req{i}")
        };
        assert_eq!(reply.into_full().unwrap(), expected);
    }

    assert_eq!(bridge.in_flight(), 0);
    let snapshot = bridge.command().snapshot();
    assert_eq!(snapshot.request_count, 200);
    assert_eq!(snapshot.error_count, 20);
}

#[tokio::test]
async fn work_after_the_answer_still_runs() {
    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    let bridge = PipelineLayer::new(registry(), config("after_answer").build().unwrap()).layer(
        handler_fn(move |req: String, res: Res| {
            let flag = Arc::clone(&flag);
            async move {
                res.respond(req);
                tokio::task::yield_now().await;
                flag.store(true, Ordering::SeqCst);
            }
        }),
    );

    let reply = bridge.request("ping".to_string()).await.unwrap();
    assert_eq!(reply.into_full().unwrap(), "ping");

    tokio::time::timeout(Duration::from_secs(1), async {
        while !done.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("handler finished after answering");
}

#[tokio::test]
async fn reset_all_reaches_bridges_already_built() {
    let registry = registry();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let handler = handler_fn(move |req: String, res: Res| {
        counted.fetch_add(1, Ordering::SeqCst);
        async move {
            if req == "fail" {
                res.throw("Boom".to_string());
            } else {
                res.respond(req);
            }
        }
    });
    let layer = PipelineLayer::new(
        registry.clone(),
        config("shared_key").request_volume_threshold(1).build().unwrap(),
    );
    let before = layer.layer(handler.clone());

    registry.reset_all();
    let after = layer.layer(handler);
    assert!(Arc::ptr_eq(&before.command(), &after.command()));

    after.request("fail".to_string()).await.unwrap_err();
    assert!(registry.get("shared_key").unwrap().is_circuit_open());
    assert!(before.command().is_circuit_open());

    assert!(registry.circuits().force_open("shared_key", true));
    let err = before.request("ping".to_string()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::OpenCircuit));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_requests_are_isolated() {
    let bridge = PipelineLayer::new(registry(), config("concurrent").build().unwrap()).layer(
        handler_fn(|req: String, res: Res| async move {
            tokio::task::yield_now().await;
            res.respond(format!("re: {req}"));
        }),
    );

    let mut handles = Vec::new();
    for i in 0..50 {
        let bridge = bridge.clone();
        handles.push(tokio::spawn(async move {
            let reply = bridge.request(i.to_string()).await.unwrap();
            (i, reply.into_full().unwrap())
        }));
    }
    for handle in handles {
        let (i, reply) = handle.await.unwrap();
        assert_eq!(reply, format!("re: {i}"));
    }
    assert_eq!(bridge.in_flight(), 0);
}

#[tokio::test]
async fn context_can_select_another_command() {
    let registry = registry();
    let bridge = PipelineLayer::new(registry.clone(), config("default_key").build().unwrap()).layer(
        handler_fn(|req: String, res: Res| async move { res.respond(req) }),
    );

    let ctx = RequestContext::new().command("special").group("vip");
    bridge.request_with("a".to_string(), ctx).await.unwrap();
    bridge.request("b".to_string()).await.unwrap();

    let special = registry.get("special").expect("registered on first use");
    assert_eq!(special.group().as_str(), "vip");
    assert_eq!(special.snapshot().request_count, 1);
    assert_eq!(registry.get("default_key").unwrap().snapshot().request_count, 1);
}

#[tokio::test]
async fn bridge_is_a_tower_service() {
    let bridge = PipelineLayer::new(registry(), config("as_service").build().unwrap()).layer(
        handler_fn(|req: String, res: Res| async move { res.respond(req.to_uppercase()) }),
    );

    let reply = bridge.oneshot("ping".to_string()).await.unwrap();
    assert_eq!(reply.into_full().unwrap(), "PING");
}

#[tokio::test]
async fn tower_services_plug_in_as_handlers() {
    let service = tower::service_fn(|req: String| async move {
        if req.is_empty() {
            Err("empty".to_string())
        } else {
            Ok(req)
        }
    });
    let bridge = PipelineLayer::new(registry(), config("service_handler").build().unwrap())
        .layer(ServiceHandler::new(service));

    let reply = bridge.request("ping".to_string()).await.unwrap();
    assert_eq!(reply.into_full().unwrap(), "ping");

    let err = bridge.request(String::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "empty");
}
