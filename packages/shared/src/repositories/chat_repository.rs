use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::{from_items, to_item};

use crate::models::chat_message::ChatMessage;
use crate::repositories::errors::chat_repository_errors::ChatMessageRepositoryError;

#[cfg(test)]
use mockall::automock;

pub struct DynamoDbChatMessageRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbChatMessageRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    async fn append_message(&self, message: &ChatMessage) -> Result<(), ChatMessageRepositoryError>;

    /// Messages of a room, oldest first.
    async fn list_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, ChatMessageRepositoryError>;
}

#[async_trait]
impl ChatMessageRepository for DynamoDbChatMessageRepository {
    async fn append_message(&self, message: &ChatMessage) -> Result<(), ChatMessageRepositoryError> {
        let item =
            to_item(message).map_err(|e| ChatMessageRepositoryError::Serialization(e.to_string()))?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| ChatMessageRepositoryError::DynamoDb(e.to_string()))?;
        Ok(())
    }

    async fn list_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, ChatMessageRepositoryError> {
        let mut messages: Vec<ChatMessage> = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("session_id = :session_id")
                .expression_attribute_values(
                    ":session_id",
                    AttributeValue::S(session_id.to_string()),
                )
                .scan_index_forward(true)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| ChatMessageRepositoryError::DynamoDb(e.to_string()))?;

            let page: Vec<ChatMessage> = from_items(output.items.unwrap_or_default())
                .map_err(|e| ChatMessageRepositoryError::Serialization(e.to_string()))?;
            messages.extend(page);

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
        Ok(messages)
    }
}
