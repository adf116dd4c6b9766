//! Top-level configuration for a coprocessor node.
//!
//! This module aggregates configuration for:
//!
//! - default rotation block periods (`LifecycleConfig`),
//! - storage (RocksDB path and creation flags),
//! - metrics exporter (enable flag + listen address),
//! - the demo loop driven by the bundled binary (`DemoConfig`).
//!
//! Every section has defaults, so a JSON file only needs to name the fields
//! it overrides.

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::storage::RocksDbConfig;
use crate::types::{BlockPeriods, ChainId};

/// Lifecycle defaults used when scheduling rotations.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Blocks a new context waits in `PreActivation`.
    pub pre_activation_block_period: u64,
    /// Blocks the replaced context stays `Suspended`.
    pub suspended_block_period: u64,
}

impl LifecycleConfig {
    pub fn block_periods(&self) -> BlockPeriods {
        BlockPeriods {
            pre_activation_block_period: self.pre_activation_block_period,
            suspended_block_period: self.suspended_block_period,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            pre_activation_block_period: 100,
            suspended_block_period: 50,
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Parameters of the demo loop run by the `coprocessor` binary.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Wall-clock milliseconds per simulated block.
    pub block_interval_ms: u64,
    /// Members of the genesis committee.
    pub genesis_committee_size: usize,
    /// Members of the committee rotated in during the run.
    pub rotation_committee_size: usize,
    /// Block at which the rotation is requested.
    pub rotation_at_block: u64,
    /// Host chain the demo facts are scoped to.
    pub host_chain_id: ChainId,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            block_interval_ms: 1_000,
            genesis_committee_size: 4,
            rotation_committee_size: 7,
            rotation_at_block: 5,
            host_chain_id: ChainId(12_345),
        }
    }
}

/// Top-level configuration for a coprocessor node.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoprocessorConfig {
    pub lifecycle: LifecycleConfig,
    pub storage: RocksDbConfig,
    pub metrics: MetricsConfig,
    pub demo: DemoConfig,
}

/// Failure to load a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config: {e}"),
            ConfigError::Parse(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl CoprocessorConfig {
    /// Parses a JSON document; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
