use serde::{Deserialize, Serialize};

use crate::models::chat_message::ChatMessage;
use crate::models::game_session::GameSession;
use crate::models::move_record::MoveRecord;
use crate::models::participant::{Color, Participant};

/// Events exchanged on a room's broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ChannelEvent {
    JoinGame {
        participant: Participant,
    },
    MakeMove {
        #[serde(rename = "move")]
        mv: MoveRecord,
        /// Index of the move in the session history.
        ply: usize,
        /// Session version after the mover's write.
        version: u64,
    },
    Resign {
        winner: Color,
        version: u64,
    },
    SendMessage {
        message: ChatMessage,
    },
    InvitePlayAgain {
        new_session_id: String,
    },
    AcceptInvite {
        new_session_id: String,
    },
    SessionUpdated {
        session: GameSession,
    },
    SessionDeleted {
        session_id: String,
    },
}

impl ChannelEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelEvent::JoinGame { .. } => "join-game",
            ChannelEvent::MakeMove { .. } => "make-move",
            ChannelEvent::Resign { .. } => "resign",
            ChannelEvent::SendMessage { .. } => "send-message",
            ChannelEvent::InvitePlayAgain { .. } => "invite-play-again",
            ChannelEvent::AcceptInvite { .. } => "accept-invite",
            ChannelEvent::SessionUpdated { .. } => "session-updated",
            ChannelEvent::SessionDeleted { .. } => "session-deleted",
        }
    }
}

/// Sender id used for events that originate from the session store rather than a player.
pub const STORE_SENDER_ID: &str = "session-store";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    pub sender_id: String,
    pub event: ChannelEvent,
}

impl BroadcastMessage {
    pub fn new(sender_id: &str, event: ChannelEvent) -> Self {
        BroadcastMessage {
            sender_id: sender_id.to_string(),
            event,
        }
    }

    pub fn from_store(event: ChannelEvent) -> Self {
        BroadcastMessage::new(STORE_SENDER_ID, event)
    }
}
