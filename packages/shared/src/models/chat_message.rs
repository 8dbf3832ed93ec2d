use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::participant::PlayerIdentity;

pub const MAX_MESSAGE_LENGTH: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub session_id: String,
    pub player_id: String,
    pub from: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(session_id: &str, sender: &PlayerIdentity, text: &str) -> Self {
        ChatMessage {
            message_id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            player_id: sender.id.clone(),
            from: sender.name.clone(),
            text: text.to_string(),
            sent_at: Utc::now(),
        }
    }
}
