//! Coprocessor context management.
//!
//! - [`registry::CommitteeRegistry`]: immutable per-version membership
//!   lookups,
//! - [`lifecycle::ContextLifecycleManager`]: rotation scheduling and the
//!   time-gated status transitions,
//! - [`error::ContextError`]: everything that can go wrong along the way.

pub mod error;
pub mod lifecycle;
pub mod registry;

pub use error::ContextError;
pub use lifecycle::ContextLifecycleManager;
pub use registry::{CommitteeRegistry, validate_members};
