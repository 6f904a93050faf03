use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Reserved liveness ping. Sent as a bare text frame, not JSON.
pub const HEARTBEAT: &str = "heartbeat";

/// Raised when an inbound frame cannot be understood. The frame is
/// dropped and the connection stays open.
#[derive(Debug, Error)]
#[error("malformed frame: {0}")]
pub struct ProtocolError(#[from] serde_json::Error);

/// Player reference as it appears inside an inbound update frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRef {
    pub id: i64,
}

/// Inbound task-completion message:
/// `{"id": 1, "completed_by": {"id": 7}, "last_updated": "2024-01-01T10:00:00Z"}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdateFrame {
    pub id: i64,
    pub completed_by: PlayerRef,
    pub last_updated: DateTime<Utc>,
}

/// The closed set of frames a client may send.
#[derive(Debug, Clone)]
pub enum ClientFrame {
    Heartbeat,
    TaskUpdate(TaskUpdateFrame),
}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        if text.trim() == HEARTBEAT {
            return Ok(ClientFrame::Heartbeat);
        }
        let update = serde_json::from_str::<TaskUpdateFrame>(text)?;
        Ok(ClientFrame::TaskUpdate(update))
    }
}

/// Denormalized completer identity carried in outbound frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleterInfo {
    pub id: i64,
    pub name: String,
}

/// Post-update task state as broadcast to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: i64,
    pub value: String,
    pub grid_row: u32,
    pub grid_column: u32,
    pub last_updated: DateTime<Utc>,
    pub completed: bool,
    pub completed_by: CompleterInfo,
    pub game_id: i64,
}

/// Outbound update frame: `{"task": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskBroadcast {
    pub task: TaskSnapshot,
}

pub fn connect_ack() -> String {
    json!({"message": "WebSocket connected!"}).to_string()
}

pub fn thump() -> String {
    json!({"message": "thump"}).to_string()
}
