use aws_lambda_events::event::dynamodb::{Event, EventRecord};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use shared::models::channel_event::{BroadcastMessage, ChannelEvent};
use shared::models::game_session::GameSession;
use shared::repositories::channel_repository::BroadcastChannel;
use shared::repositories::errors::broadcast_errors::BroadcastError;

#[derive(Debug)]
pub enum NotifierError {
    Decode(String),
    Broadcast(BroadcastError),
}

impl std::fmt::Display for NotifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifierError::Decode(msg) => write!(f, "Failed to decode stream image: {}", msg),
            NotifierError::Broadcast(err) => write!(f, "Failed to notify room: {}", err),
        }
    }
}

impl std::error::Error for NotifierError {}

impl From<serde_dynamo::Error> for NotifierError {
    fn from(err: serde_dynamo::Error) -> Self {
        NotifierError::Decode(err.to_string())
    }
}

impl From<BroadcastError> for NotifierError {
    fn from(err: BroadcastError) -> Self {
        NotifierError::Broadcast(err)
    }
}

#[derive(Debug, Deserialize)]
struct SessionKey {
    session_id: String,
}

/// Pushes changes of the game sessions table to the players in each room.
pub struct SessionChangeNotifier {
    channel: Arc<dyn BroadcastChannel>,
}

impl SessionChangeNotifier {
    pub fn new(channel: Arc<dyn BroadcastChannel>) -> Self {
        SessionChangeNotifier { channel }
    }

    /// Processes every record of a stream batch and returns how many failed.
    /// A failed record is logged and does not stop the rest of the batch.
    pub async fn handle_event(&self, event: Event) -> usize {
        let mut failed = 0;
        for record in &event.records {
            if let Err(e) = self.process_record(record).await {
                error!("Failed to process record {}: {}", record.event_id, e);
                failed += 1;
            }
        }
        failed
    }

    pub async fn process_record(&self, record: &EventRecord) -> Result<(), NotifierError> {
        match record.event_name.as_str() {
            "MODIFY" => {
                let session: GameSession = serde_dynamo::from_item(record.change.new_image.clone())?;
                let session_id = session.session_id.clone();
                let message = BroadcastMessage::from_store(ChannelEvent::SessionUpdated { session });
                self.channel.publish(&session_id, &message).await?;
                info!("Notified room {} of session update", session_id);
            }
            "REMOVE" => {
                let key: SessionKey = serde_dynamo::from_item(record.change.keys.clone())?;
                let message = BroadcastMessage::from_store(ChannelEvent::SessionDeleted {
                    session_id: key.session_id.clone(),
                });
                self.channel.publish(&key.session_id, &message).await?;
                info!("Notified room {} of session deletion", key.session_id);
            }
            "INSERT" => {
                let session: GameSession = serde_dynamo::from_item(record.change.new_image.clone())?;
                info!(
                    "New game session {} created by {}",
                    session.session_id, session.creator_id
                );
            }
            other => warn!("Unhandled event type: {}", other),
        }

        Ok(())
    }
}
