use std::sync::Arc;
use tracing::{error, info};

use crate::{
    models::{
        channel_event::{BroadcastMessage, ChannelEvent},
        chat_message::{ChatMessage, MAX_MESSAGE_LENGTH},
        participant::PlayerIdentity,
    },
    repositories::{channel_repository::BroadcastChannel, chat_repository::ChatMessageRepository},
    services::errors::chat_service_errors::ChatServiceError,
};

#[derive(Clone)]
pub struct ChatService {
    repository: Arc<dyn ChatMessageRepository>,
    channel: Arc<dyn BroadcastChannel>,
}

impl ChatService {
    pub fn new(
        repository: Arc<dyn ChatMessageRepository>,
        channel: Arc<dyn BroadcastChannel>,
    ) -> Self {
        ChatService {
            repository,
            channel,
        }
    }

    /// Sends a chat line to the room.
    ///
    /// The room sees the message even if storing it fails; only a failed
    /// broadcast is an error.
    pub async fn send_message(
        &self,
        session_id: &str,
        sender: &PlayerIdentity,
        text: &str,
    ) -> Result<ChatMessage, ChatServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatServiceError::ValidationError(
                "Message cannot be empty".to_string(),
            ));
        }
        if text.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatServiceError::ValidationError(format!(
                "Message cannot be longer than {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }

        let message = ChatMessage::new(session_id, sender, text);
        if let Err(e) = self.repository.append_message(&message).await {
            error!(
                "Failed to store chat message {} in room {}: {}",
                message.message_id, session_id, e
            );
        }

        let broadcast = BroadcastMessage::new(
            &sender.id,
            ChannelEvent::SendMessage {
                message: message.clone(),
            },
        );
        self.channel.publish(session_id, &broadcast).await?;

        info!("Player {} sent a message to room {}", sender.id, session_id);
        Ok(message)
    }

    /// Stored messages of a room, oldest first.
    pub async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>, ChatServiceError> {
        Ok(self.repository.list_messages(session_id).await?)
    }
}
