use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::channel_event::BroadcastMessage;
use crate::models::room_connection::RoomConnection;
use crate::repositories::channel_repository::BroadcastChannel;
use crate::repositories::errors::broadcast_errors::BroadcastError;
use crate::repositories::websocket_repository::{ConnectionGone, WebSocketRepository};

/// Room channels carried over API Gateway WebSocket connections.
#[derive(Clone)]
pub struct WebSocketService {
    repository: Arc<dyn WebSocketRepository>,
}

impl WebSocketService {
    pub fn new(repository: Arc<dyn WebSocketRepository>) -> Self {
        Self { repository }
    }

    pub async fn join_room(
        &self,
        connection: &RoomConnection,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            "Player {} joining room {} on connection {}",
            connection.player_id, connection.session_id, connection.connection_id
        );
        self.repository.store_connection(connection).await
    }

    pub async fn leave_room(
        &self,
        connection_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Removing WebSocket connection by ID: {}", connection_id);
        self.repository.remove_connection_by_id(connection_id).await
    }

    pub async fn get_connection(
        &self,
        connection_id: &str,
    ) -> Result<Option<RoomConnection>, Box<dyn std::error::Error + Send + Sync>> {
        self.repository.get_connection(connection_id).await
    }

    pub async fn send_message(
        &self,
        connection_id: &str,
        message: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.repository.send_message(connection_id, message).await
    }

    /// Sends `payload` to every connection of a room except `skip_connection_id`
    /// and returns how many received it.
    ///
    /// Connections whose client has gone away are removed; other delivery
    /// failures are logged and skipped.
    pub async fn relay(
        &self,
        session_id: &str,
        skip_connection_id: Option<&str>,
        payload: &str,
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let connections = self.repository.get_room_connections(session_id).await?;
        let mut delivered = 0;

        for connection in connections
            .iter()
            .filter(|c| Some(c.connection_id.as_str()) != skip_connection_id)
        {
            match self
                .repository
                .send_message(&connection.connection_id, payload)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) if e.downcast_ref::<ConnectionGone>().is_some() => {
                    info!("Pruning stale connection {}", connection.connection_id);
                    if let Err(e) = self
                        .repository
                        .remove_connection_by_id(&connection.connection_id)
                        .await
                    {
                        warn!(
                            "Failed to remove stale connection {}: {}",
                            connection.connection_id, e
                        );
                    }
                }
                Err(e) => warn!(
                    "Failed to deliver to connection {} in room {}: {}",
                    connection.connection_id, session_id, e
                ),
            }
        }

        Ok(delivered)
    }
}

#[async_trait]
impl BroadcastChannel for WebSocketService {
    async fn publish(
        &self,
        channel_id: &str,
        message: &BroadcastMessage,
    ) -> Result<(), BroadcastError> {
        let payload = serde_json::to_string(message)
            .map_err(|e| BroadcastError::Serialization(e.to_string()))?;
        let delivered = self
            .relay(channel_id, None, &payload)
            .await
            .map_err(|e| BroadcastError::Transport(e.to_string()))?;

        info!(
            "Published {} to {} connections in room {}",
            message.event.name(),
            delivered,
            channel_id
        );
        Ok(())
    }
}
