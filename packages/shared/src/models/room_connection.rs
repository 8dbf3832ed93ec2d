use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A live WebSocket subscriber of one room's broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConnection {
    pub connection_id: String,
    pub session_id: String,
    pub player_id: String,
    pub connected_at: DateTime<Utc>,
}

impl RoomConnection {
    pub fn new(connection_id: &str, session_id: &str, player_id: &str) -> Self {
        RoomConnection {
            connection_id: connection_id.to_string(),
            session_id: session_id.to_string(),
            player_id: player_id.to_string(),
            connected_at: Utc::now(),
        }
    }
}
