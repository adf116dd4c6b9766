//! Admission gates consulted before any state-mutating operation.
//!
//! The coprocessor core does not own chain registration or access control;
//! it consults them through two small traits:
//!
//! - [`host_chain::HostChainRegistry`]: is the chain a fact key belongs to
//!   known?
//! - [`access::AccessControl`]: is the caller privileged, and is the system
//!   paused?
//!
//! Concrete in-process implementations are provided for nodes and tests.

pub mod access;
pub mod error;
pub mod host_chain;

pub use access::{AccessControl, RoleAccessControl};
pub use error::GateError;
pub use host_chain::{HostChainRegistry, StaticHostChainRegistry};
