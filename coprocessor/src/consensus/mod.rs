//! Attestation consensus and the coordinating engine.
//!
//! This module provides:
//!
//! - the storage abstraction shared by every component ([`store`]),
//! - threshold accumulation of attested facts ([`accumulator`]),
//! - event sinks for committed transitions ([`events`]),
//! - the [`engine::CoprocessorEngine`] tying gates, lifecycle and
//!   accumulation to one store.

pub mod accumulator;
pub mod engine;
pub mod error;
pub mod events;
pub mod store;

pub use accumulator::{ConsensusAccumulator, Submission};
pub use engine::CoprocessorEngine;
pub use error::ConsensusError;
pub use events::{EventLog, EventSink, TracingEventSink};
pub use store::{
    Changeset, ContextPointers, ContextStore, FactStore, StateDelta, StateStore,
};
