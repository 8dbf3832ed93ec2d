//! In-process implementations of the store and channel traits, used for local
//! play and throughout the test suites.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::models::channel_event::BroadcastMessage;
use crate::models::chat_message::ChatMessage;
use crate::models::game_session::{GameSession, GameSessionUpdate};
use crate::repositories::channel_repository::BroadcastChannel;
use crate::repositories::chat_repository::ChatMessageRepository;
use crate::repositories::errors::broadcast_errors::BroadcastError;
use crate::repositories::errors::chat_repository_errors::ChatMessageRepositoryError;
use crate::repositories::errors::game_repository_errors::GameSessionRepositoryError;
use crate::repositories::game_repository::{merge_update, GameSessionRepository};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
pub struct InMemoryGameSessionRepository {
    sessions: RwLock<HashMap<String, GameSession>>,
}

impl InMemoryGameSessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameSessionRepository for InMemoryGameSessionRepository {
    async fn create_game_session(
        &self,
        game_session: &GameSession,
    ) -> Result<(), GameSessionRepositoryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&game_session.session_id) {
            return Err(GameSessionRepositoryError::AlreadyExists);
        }
        sessions.insert(game_session.session_id.clone(), game_session.clone());
        Ok(())
    }

    async fn get_game_session(
        &self,
        session_id: &str,
    ) -> Result<Option<GameSession>, GameSessionRepositoryError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn update_game_session(
        &self,
        session_id: &str,
        update: &GameSessionUpdate,
    ) -> Result<GameSession, GameSessionRepositoryError> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(session_id)
            .ok_or(GameSessionRepositoryError::NotFound)?;

        // Merge into a copy so a rejected update leaves the stored session untouched.
        let mut merged = stored.clone();
        merge_update(&mut merged, update)?;
        *stored = merged.clone();
        Ok(merged)
    }

    async fn delete_game_session(
        &self,
        session_id: &str,
        expected_version: Option<u64>,
    ) -> Result<(), GameSessionRepositoryError> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get(session_id)
            .ok_or(GameSessionRepositoryError::NotFound)?;
        if let Some(expected) = expected_version {
            if expected != stored.version {
                return Err(GameSessionRepositoryError::VersionConflict {
                    expected,
                    actual: stored.version,
                });
            }
        }
        sessions.remove(session_id);
        Ok(())
    }

    async fn list_game_sessions_for_player(
        &self,
        player_id: &str,
    ) -> Result<Vec<GameSession>, GameSessionRepositoryError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|session| session.participant(player_id).is_some())
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryChatMessageRepository {
    messages: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryChatMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatMessageRepository for InMemoryChatMessageRepository {
    async fn append_message(&self, message: &ChatMessage) -> Result<(), ChatMessageRepositoryError> {
        self.messages
            .write()
            .await
            .entry(message.session_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn list_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, ChatMessageRepositoryError> {
        Ok(self
            .messages
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Broadcast channels backed by one `tokio::sync::broadcast` sender per channel id.
#[derive(Default)]
pub struct LocalBroadcastHub {
    channels: Mutex<HashMap<String, broadcast::Sender<BroadcastMessage>>>,
}

impl LocalBroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<BroadcastMessage>>> {
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Receives every message published on `channel_id` from now on.
    pub fn subscribe(&self, channel_id: &str) -> broadcast::Receiver<BroadcastMessage> {
        self.channels()
            .entry(channel_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, channel_id: &str) -> usize {
        self.channels()
            .get(channel_id)
            .map_or(0, |sender| sender.receiver_count())
    }
}

#[async_trait]
impl BroadcastChannel for LocalBroadcastHub {
    async fn publish(
        &self,
        channel_id: &str,
        message: &BroadcastMessage,
    ) -> Result<(), BroadcastError> {
        // A send with no subscribers is not an error: nobody was listening.
        let mut channels = self.channels();
        let delivered = channels
            .get(channel_id)
            .and_then(|sender| sender.send(message.clone()).ok());
        match delivered {
            Some(receivers) => debug!(
                "Published {} on {} to {} subscribers",
                message.event.name(),
                channel_id,
                receivers
            ),
            None => {
                channels.remove(channel_id);
                debug!(
                    "Published {} on {} with no subscribers",
                    message.event.name(),
                    channel_id
                );
            }
        }
        Ok(())
    }
}
