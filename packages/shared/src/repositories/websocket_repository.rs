use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::{primitives::Blob, Client as ApiGatewayClient};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use serde_dynamo::{from_item, from_items, to_item};
use tracing::info;

use crate::models::room_connection::RoomConnection;

pub const CONNECTIONS_BY_SESSION_INDEX: &str = "GSI_ConnectionsBySession";

/// The client behind a connection id has gone away.
#[derive(Debug)]
pub struct ConnectionGone(pub String);

impl std::fmt::Display for ConnectionGone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Connection {} is gone", self.0)
    }
}

impl std::error::Error for ConnectionGone {}

#[async_trait]
pub trait WebSocketRepository: Send + Sync {
    async fn store_connection(
        &self,
        connection: &RoomConnection,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_connection(
        &self,
        connection_id: &str,
    ) -> Result<Option<RoomConnection>, Box<dyn std::error::Error + Send + Sync>>;

    async fn remove_connection_by_id(
        &self,
        connection_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_room_connections(
        &self,
        session_id: &str,
    ) -> Result<Vec<RoomConnection>, Box<dyn std::error::Error + Send + Sync>>;

    async fn send_message(
        &self,
        connection_id: &str,
        message: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub struct DynamoDbWebSocketRepository {
    dynamodb_client: DynamoDbClient,
    api_gateway_client: ApiGatewayClient,
    table_name: String,
}

impl DynamoDbWebSocketRepository {
    /// `api_gateway_client` must be configured with the WebSocket API's
    /// management endpoint (`https://{api-id}.execute-api.{region}.amazonaws.com/{stage}`).
    pub fn new(
        dynamodb_client: DynamoDbClient,
        api_gateway_client: ApiGatewayClient,
        table_name: &str,
    ) -> Self {
        Self {
            dynamodb_client,
            api_gateway_client,
            table_name: table_name.to_string(),
        }
    }

    pub fn management_client(config: &aws_config::SdkConfig, endpoint: &str) -> ApiGatewayClient {
        let api_gateway_config = aws_sdk_apigatewaymanagement::config::Builder::from(config)
            .endpoint_url(endpoint)
            .build();
        ApiGatewayClient::from_conf(api_gateway_config)
    }
}

#[async_trait]
impl WebSocketRepository for DynamoDbWebSocketRepository {
    async fn store_connection(
        &self,
        connection: &RoomConnection,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let item = to_item(connection)?;
        self.dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await?;

        info!(
            "Stored connection {} for player {} in room {}",
            connection.connection_id, connection.player_id, connection.session_id
        );
        Ok(())
    }

    async fn get_connection(
        &self,
        connection_id: &str,
    ) -> Result<Option<RoomConnection>, Box<dyn std::error::Error + Send + Sync>> {
        let result = self
            .dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .key("connection_id", AttributeValue::S(connection_id.to_string()))
            .send()
            .await?;

        match result.item {
            Some(item) => Ok(Some(from_item(item)?)),
            None => Ok(None),
        }
    }

    async fn remove_connection_by_id(
        &self,
        connection_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.dynamodb_client
            .delete_item()
            .table_name(&self.table_name)
            .key("connection_id", AttributeValue::S(connection_id.to_string()))
            .send()
            .await?;

        info!("Removed WebSocket connection by ID: {}", connection_id);
        Ok(())
    }

    async fn get_room_connections(
        &self,
        session_id: &str,
    ) -> Result<Vec<RoomConnection>, Box<dyn std::error::Error + Send + Sync>> {
        let result = self
            .dynamodb_client
            .query()
            .table_name(&self.table_name)
            .index_name(CONNECTIONS_BY_SESSION_INDEX)
            .key_condition_expression("session_id = :session_id")
            .expression_attribute_values(
                ":session_id",
                AttributeValue::S(session_id.to_string()),
            )
            .send()
            .await?;

        let connections: Vec<RoomConnection> = from_items(result.items.unwrap_or_default())?;
        Ok(connections)
    }

    async fn send_message(
        &self,
        connection_id: &str,
        message: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let result = self
            .api_gateway_client
            .post_to_connection()
            .connection_id(connection_id)
            .data(Blob::new(message.as_bytes()))
            .send()
            .await;

        if let Err(e) = result {
            let service_error = e.into_service_error();
            if service_error.is_gone_exception() {
                return Err(Box::new(ConnectionGone(connection_id.to_string())));
            }
            return Err(Box::new(service_error));
        }

        info!("Sent message to connection: {}", connection_id);
        Ok(())
    }
}
