//! Metrics and instrumentation.
//!
//! Prometheus-compatible counters for the attestation path and the context
//! lifecycle, plus a small HTTP exporter serving `/metrics` in the
//! Prometheus text format.
//!
//! ```ignore
//! use std::sync::Arc;
//! use coprocessor::metrics::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! tokio::spawn(run_prometheus_http_server(registry.clone(), "127.0.0.1:9898".parse()?));
//!
//! let engine = engine.with_metrics(registry.consensus.clone());
//! ```

pub mod prometheus;

pub use prometheus::{ConsensusMetrics, MetricsRegistry, run_prometheus_http_server};
