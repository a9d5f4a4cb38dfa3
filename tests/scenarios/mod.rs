//! Scenario tests.
//!
//! Test organization:
//! - basics.rs: responses, errors, timeouts, fallbacks and the published record
//! - circuit.rs: one key driven through open, recovery and forced states
//! - multiple_services.rs: several keys under load, published together
//! - streaming.rs: streamed responses through a guarded pipeline

mod multiple_services;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::Layer;
use tower_hystrix_circuitbreaker::MetricsPublisher;
use tower_hystrix_command::{CommandConfig, CommandRegistry};
use tower_hystrix_pipeline::{handler_fn, Handler, PipelineBridge, PipelineLayer, Responder};

pub(crate) type Res = Responder<String, String, String>;
pub(crate) type Registry = Arc<CommandRegistry<String, String, String>>;

/// Responds with the request after `latency`, failing with "Boom" on every
/// `rate`-th request.
#[derive(Clone)]
pub(crate) struct FlakyTransport {
    pub(crate) rate: Arc<AtomicUsize>,
    pub(crate) counter: Arc<AtomicUsize>,
    pub(crate) latency: Duration,
}

impl FlakyTransport {
    pub(crate) fn new(rate: usize, latency: Duration) -> Self {
        Self {
            rate: Arc::new(AtomicUsize::new(rate)),
            counter: Arc::new(AtomicUsize::new(0)),
            latency,
        }
    }

    pub(crate) fn set_rate(&self, rate: usize) {
        self.rate.store(rate, Ordering::SeqCst);
        self.counter.store(0, Ordering::SeqCst);
    }

    pub(crate) fn handler(
        &self,
    ) -> impl Handler<String, Response = String, Chunk = String, Error = String> + use<> {
        let transport = self.clone();
        handler_fn(move |req: String, res: Res| {
            let transport = transport.clone();
            async move {
                tokio::time::sleep(transport.latency).await;
                let count = transport.counter.fetch_add(1, Ordering::SeqCst) + 1;
                if count % transport.rate.load(Ordering::SeqCst) == 0 {
                    res.throw("Boom".to_string());
                } else {
                    res.respond(req);
                }
            }
        })
    }
}

/// Routes the crates' logs to the test harness; repeated calls are no-ops.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

pub(crate) fn guarded<H>(
    registry: &Registry,
    config: CommandConfig<String, String, String>,
    handler: H,
) -> PipelineBridge<H, String>
where
    H: Handler<String, Response = String, Chunk = String, Error = String>,
{
    init_tracing();
    PipelineLayer::new(Arc::clone(registry), config).layer(handler)
}

/// Publishes once and parses every record sent.
pub(crate) fn published(registry: &Registry) -> Vec<serde_json::Value> {
    let publisher = MetricsPublisher::new(Arc::clone(registry.circuits()));
    let mut rx = publisher.subscribe();
    publisher.publish();

    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(serde_json::from_str(&record).unwrap());
    }
    records
}
