//! Prometheus-backed metrics and HTTP exporter.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

use crate::types::CoprocessorEvent;

/// Attestation and lifecycle metrics.
#[derive(Clone)]
pub struct ConsensusMetrics {
    /// Submissions recorded against a fact.
    pub attestations_accepted: IntCounter,
    /// Submissions rejected for any reason.
    pub attestations_rejected: IntCounter,
    /// Facts that reached their majority threshold.
    pub facts_finalized: IntCounter,
    /// Context status changes (activation, suspension, deactivation, ...).
    pub context_transitions: IntCounter,
    /// Id of the currently active context.
    pub active_context_id: IntGauge,
    /// Time spent handling one submission, in seconds.
    pub submission_seconds: Histogram,
}

impl ConsensusMetrics {
    /// Registers the metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let attestations_accepted = IntCounter::with_opts(Opts::new(
            "attestations_accepted_total",
            "Attestation submissions recorded against a fact",
        ))?;
        registry.register(Box::new(attestations_accepted.clone()))?;

        let attestations_rejected = IntCounter::with_opts(Opts::new(
            "attestations_rejected_total",
            "Attestation submissions rejected",
        ))?;
        registry.register(Box::new(attestations_rejected.clone()))?;

        let facts_finalized = IntCounter::with_opts(Opts::new(
            "facts_finalized_total",
            "Facts that reached the majority threshold of their pinned context",
        ))?;
        registry.register(Box::new(facts_finalized.clone()))?;

        let context_transitions = IntCounter::with_opts(Opts::new(
            "context_transitions_total",
            "Coprocessor context status transitions",
        ))?;
        registry.register(Box::new(context_transitions.clone()))?;

        let active_context_id = IntGauge::with_opts(Opts::new(
            "active_context_id",
            "Id of the active coprocessor context",
        ))?;
        registry.register(Box::new(active_context_id.clone()))?;

        let submission_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "submission_seconds",
                "Time to validate and record one attestation submission in seconds",
            )
            .buckets(vec![
                0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
            ]),
        )?;
        registry.register(Box::new(submission_seconds.clone()))?;

        Ok(Self {
            attestations_accepted,
            attestations_rejected,
            facts_finalized,
            context_transitions,
            active_context_id,
            submission_seconds,
        })
    }

    /// Updates counters for a committed event.
    pub fn observe_event(&self, event: &CoprocessorEvent) {
        match event {
            CoprocessorEvent::FactFinalized { .. } => self.facts_finalized.inc(),
            CoprocessorEvent::ActivateContext { context_id } => {
                self.context_transitions.inc();
                self.active_context_id.set(context_id.0 as i64);
            }
            CoprocessorEvent::MoveSuspendedToActive { reactivated, .. } => {
                self.context_transitions.inc();
                self.active_context_id.set(reactivated.0 as i64);
            }
            other if other.is_transition() => self.context_transitions.inc(),
            _ => {}
        }
    }
}

/// Wrapper around a Prometheus registry and the consensus metrics.
///
/// Wrap it in an [`Arc`] to share it between the engine and the exporter.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub consensus: ConsensusMetrics,
}

impl MetricsRegistry {
    /// Creates a fresh registry (namespace `coprocessor`) and registers the
    /// consensus metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("coprocessor".to_string()), None)?;
        let consensus = ConsensusMetrics::register(&registry)?;
        Ok(Self {
            registry,
            consensus,
        })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that serves `GET /metrics`; every other path is a
/// 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::warn!(error = %err, "prometheus HTTP connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(route(req.method(), req.uri().path(), &metrics))
}

fn route(method: &Method, path: &str, metrics: &MetricsRegistry) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/metrics") => {
            let mut response = Response::new(Full::new(Bytes::from(metrics.gather_text())));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        _ => {
            let mut response = Response::new(Full::new(Bytes::from("not found")));
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContextId;

    #[test]
    fn consensus_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ConsensusMetrics::register(&registry).expect("register metrics");

        metrics.attestations_accepted.inc();
        metrics.attestations_rejected.inc();
        metrics.submission_seconds.observe(0.000_2);

        assert!(!registry.gather().is_empty());
    }

    #[test]
    fn events_drive_lifecycle_metrics() {
        let registry = Registry::new();
        let metrics = ConsensusMetrics::register(&registry).expect("register metrics");

        metrics.observe_event(&CoprocessorEvent::ActivateContext {
            context_id: ContextId(4),
        });
        metrics.observe_event(&CoprocessorEvent::DeactivateContext {
            context_id: ContextId(3),
        });

        assert_eq!(metrics.active_context_id.get(), 4);
        assert_eq!(metrics.context_transitions.get(), 2);
        assert_eq!(metrics.facts_finalized.get(), 0);
    }

    #[test]
    fn metrics_route_serves_text_and_404() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.consensus.facts_finalized.inc();

        let ok = route(&Method::GET, "/metrics", &registry);
        assert_eq!(ok.status(), StatusCode::OK);

        let missing = route(&Method::GET, "/other", &registry);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        assert!(registry.gather_text().contains("coprocessor_facts_finalized_total"));
    }
}
