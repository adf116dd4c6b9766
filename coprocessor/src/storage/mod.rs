//! Storage backends for coprocessor state.
//!
//! This module provides concrete implementations of the
//! [`crate::consensus::store::StateStore`] trait, including:
//!
//! - an in-memory store ([`mem::InMemoryStateStore`]) suitable for tests,
//! - a RocksDB-backed store ([`rocksdb::RocksDbStateStore`]) for persistent
//!   nodes.

pub mod error;
pub mod mem;
pub mod rocksdb;

pub use error::StorageError;
pub use mem::InMemoryStateStore;
pub use rocksdb::{RocksDbConfig, RocksDbStateStore};
