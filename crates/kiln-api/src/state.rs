//! Application state shared across handlers.

use kiln_events::BroadcastEventSink;
use kiln_scheduler::Orchestrator;

/// Default number of builds returned by the list endpoint.
pub const DEFAULT_LIST_LIMIT: u32 = 10;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    /// Source of events for WebSocket observers. The orchestrator must be
    /// publishing into this sink, directly or through a fan-out.
    pub events: BroadcastEventSink,
    pub list_limit: u32,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, events: BroadcastEventSink) -> Self {
        Self {
            orchestrator,
            events,
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }

    pub fn with_list_limit(mut self, limit: u32) -> Self {
        self.list_limit = limit.max(1);
        self
    }
}
