//! Event sinks.
//!
//! The engine publishes every [`CoprocessorEvent`] synchronously, right
//! after the state change it describes has been committed. Sinks must not
//! fail: delivery problems are theirs to log.

use crate::types::CoprocessorEvent;

/// Observer of committed lifecycle and finalization events.
pub trait EventSink {
    fn publish(&mut self, event: &CoprocessorEvent);
}

/// Keeps every published event in memory, in publication order.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<CoprocessorEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[CoprocessorEvent] {
        &self.events
    }

    /// Removes and returns everything published so far.
    pub fn drain(&mut self) -> Vec<CoprocessorEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for EventLog {
    fn publish(&mut self, event: &CoprocessorEvent) {
        self.events.push(event.clone());
    }
}

/// Writes each event as a structured `tracing` line.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&mut self, event: &CoprocessorEvent) {
        match event {
            CoprocessorEvent::NewContext {
                old,
                new,
                block_periods,
            } => tracing::info!(
                event = event.name(),
                old_context = %old.committee.context_id,
                new_context = %new.committee.context_id,
                members = new.committee.members.len(),
                pre_activation_blocks = block_periods.pre_activation_block_period,
                suspended_blocks = block_periods.suspended_block_period,
                "coprocessor context created"
            ),
            CoprocessorEvent::FactFinalized {
                fact_key,
                context_id,
                submitters,
                ..
            } => tracing::info!(
                event = event.name(),
                fact_key = %fact_key,
                context = %context_id,
                submitters = submitters.len(),
                "fact finalized"
            ),
            other => tracing::info!(event = other.name(), detail = ?other, "context transition"),
        }
    }
}
