use anyhow::Result;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::sync::Arc;
use std::thread;

/// Counters incremented by the service on every gate decision and receipt
/// submission. Prefixed `swarmgate_` for namespacing.
pub struct Metrics {
    registry: Registry,
    pub announces_allowed: IntCounter,
    pub announces_denied: IntCounter,
    pub receipts_accepted: IntCounter,
    pub receipts_rejected: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Arc<Metrics>> {
        let registry = Registry::new();
        let announces_allowed =
            IntCounter::new("swarmgate_announces_allowed", "Announces that passed the gate")?;
        let announces_denied =
            IntCounter::new("swarmgate_announces_denied", "Announces denied by the gate")?;
        let receipts_accepted =
            IntCounter::new("swarmgate_receipts_accepted", "Receipts committed to the ledger")?;
        let receipts_rejected =
            IntCounter::new("swarmgate_receipts_rejected", "Receipts rejected or rolled back")?;
        for c in [&announces_allowed, &announces_denied, &receipts_accepted, &receipts_rejected] {
            registry.register(Box::new(c.clone()))?;
        }
        Ok(Arc::new(Metrics {
            registry,
            announces_allowed,
            announces_denied,
            receipts_accepted,
            receipts_rejected,
        }))
    }
}

/// Serve the text exposition on `cfg.bind` from a plain thread.
pub fn serve(cfg: crate::config::Metrics, metrics: Arc<Metrics>) -> Result<()> {
    let bind_addr = cfg.bind;
    thread::spawn(move || {
        let server = match tiny_http::Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("could not start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        for request in server.incoming_requests() {
            let mut buffer = vec![];
            let encoder = TextEncoder::new();
            let metric_families = metrics.registry.gather();
            if encoder.encode(&metric_families, &mut buffer).is_err() {
                eprintln!("could not encode metrics");
                continue;
            }

            let response = tiny_http::Response::from_data(buffer).with_header(
                "Content-Type: application/openmetrics-text; version=1.0.0; charset=utf-8"
                    .parse::<tiny_http::Header>()
                    .unwrap(),
            );

            let _ = request.respond(response);
        }
    });

    Ok(())
}
