//! Coprocessor context management and attestation consensus.
//!
//! This crate provides the building blocks of a committee-attestation
//! core:
//!
//! - strongly-typed domain types (`types`),
//! - versioned committees and their time-gated lifecycle (`context`),
//! - majority-threshold accumulation of attested facts and the
//!   coordinating engine (`consensus`),
//! - host-chain and access-control admission gates (`validation`),
//! - storage backends (`storage`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level node configuration (`config`).

pub mod config;
pub mod consensus;
pub mod context;
pub mod metrics;
pub mod storage;
pub mod types;
pub mod validation;

// Re-export top-level configuration types.
pub use config::{ConfigError, CoprocessorConfig, DemoConfig, LifecycleConfig, MetricsConfig};

// Re-export "core" consensus and lifecycle types and traits.
pub use consensus::{
    Changeset, ConsensusAccumulator, ConsensusError, ContextPointers, ContextStore,
    CoprocessorEngine, EventLog, EventSink, FactStore, StateDelta, StateStore, Submission,
    TracingEventSink,
};
pub use context::{CommitteeRegistry, ContextError, ContextLifecycleManager};

// Re-export admission gates.
pub use validation::{
    AccessControl, GateError, HostChainRegistry, RoleAccessControl, StaticHostChainRegistry,
};

// Re-export storage backends.
pub use storage::{InMemoryStateStore, RocksDbConfig, RocksDbStateStore, StorageError};

// Re-export metrics registry and consensus metrics.
pub use metrics::{ConsensusMetrics, MetricsRegistry, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Type alias for the default state backend.
pub type DefaultStateStore = RocksDbStateStore;

/// Type alias for the engine stack used by a typical node: RocksDB state,
/// a static host-chain list, the owner/pauser gate and tracing output.
pub type DefaultCoprocessorEngine = CoprocessorEngine<
    DefaultStateStore,
    StaticHostChainRegistry,
    RoleAccessControl,
    TracingEventSink,
>;
