//! Event types for clockworkd -> client streaming

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{ConnectionPhase, EngineKind, ExportHistoryItem, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: clockwork_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// The active connection was replaced, closed or failed
    ConnectionChanged {
        phase: ConnectionPhase,
        engine: Option<EngineKind>,
    },

    /// A new export artifact was written and recorded
    ExportRecorded { item: ExportHistoryItem },

    /// Export history entries were deleted or cleared
    HistoryChanged { remaining: usize },

    /// Service is shutting down
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization() {
        let event = Event::new(EventPayload::ConnectionChanged {
            phase: ConnectionPhase::Connected,
            engine: Some(EngineKind::Postgres),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("connection_changed"));
        let parsed: Event = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.api_version, API_VERSION);
        assert!(matches!(
            parsed.payload,
            EventPayload::ConnectionChanged { phase: ConnectionPhase::Connected, .. }
        ));
    }
}
