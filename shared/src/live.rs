use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::MapContext;
use crate::classification::Classification;
use crate::vector::Vector2;

/// Aggregate transport state, forwarded to the UI for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Connecting,
    Disconnected,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// An explicit `DeleteCharacterData` message.
    Deleted,
    /// Liveness lapsed and the expiry sweep collected it.
    Expired,
    /// The viewer switched to another map.
    ContextSwitched,
}

/// Lifecycle notification emitted by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    Created {
        account_name: String,
    },
    Updated {
        account_name: String,
    },
    Removed {
        account_name: String,
        reason: RemovalReason,
    },
    ContextChanged {
        context: MapContext,
    },
    Connection {
        state: ConnectionState,
    },
}

impl LiveEvent {
    pub fn account_name(&self) -> Option<&str> {
        match self {
            Self::Created { account_name }
            | Self::Updated { account_name }
            | Self::Removed { account_name, .. } => Some(account_name),
            Self::ContextChanged { .. } | Self::Connection { .. } => None,
        }
    }
}

/// One row of the "who's online" listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub account_name: String,
    pub character_name: String,
    pub is_self: bool,
    pub map_id: u32,
    pub position: Vector2,
    pub heading: f64,
    #[serde(flatten)]
    pub classification: Classification,
    pub last_message_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{ConnectionState, LiveEvent, RemovalReason};

    #[test]
    fn lifecycle_events_are_tagged_for_sse_clients() {
        let event = LiveEvent::Removed {
            account_name: "alice".to_string(),
            reason: RemovalReason::Expired,
        };
        let json = serde_json::to_value(&event).expect("event serializes");
        assert_eq!(json["type"], "removed");
        assert_eq!(json["reason"], "expired");
        assert_eq!(event.account_name(), Some("alice"));
    }

    #[test]
    fn connection_state_defaults_to_unknown() {
        assert_eq!(ConnectionState::default(), ConnectionState::Unknown);
        let json = serde_json::to_string(&ConnectionState::Connecting).expect("state serializes");
        assert_eq!(json, "\"connecting\"");
    }
}
