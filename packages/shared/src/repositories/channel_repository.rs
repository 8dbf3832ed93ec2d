use async_trait::async_trait;

use crate::models::channel_event::BroadcastMessage;
use crate::repositories::errors::broadcast_errors::BroadcastError;

#[cfg(test)]
use mockall::automock;

/// Fan-out of room events to the subscribers of a channel.
///
/// Delivery is best effort and at most once per subscriber: nothing is
/// persisted or replayed for late or lagging subscribers.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BroadcastChannel: Send + Sync {
    async fn publish(
        &self,
        channel_id: &str,
        message: &BroadcastMessage,
    ) -> Result<(), BroadcastError>;
}
