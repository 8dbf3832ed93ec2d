use aws_lambda_events::apigw::ApiGatewayWebsocketProxyRequest;
use lambda_runtime::Error;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::routes::response;
use crate::state::AppState;
use shared::models::channel_event::{BroadcastMessage, ChannelEvent};

/// Messages a client may send on the `$default` route.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    Ping,
    /// Relay an event to the other connections of the sender's room.
    Broadcast { event: ChannelEvent },
}

pub async fn handle_default_message(
    event: &ApiGatewayWebsocketProxyRequest,
    state: AppState,
) -> Result<Value, Error> {
    let connection_id = event
        .request_context
        .connection_id
        .as_deref()
        .unwrap_or("");

    let Some(body) = &event.body else {
        debug!("No body found in WebSocket event");
        return Ok(response(400, Some(json!({"error": "No message body"}))));
    };

    let action: ClientAction = match serde_json::from_str(body) {
        Ok(action) => action,
        Err(e) => {
            debug!("Failed to parse message from {}: {}", connection_id, e);
            return Ok(response(400, Some(json!({"error": "Invalid message"}))));
        }
    };

    match action {
        ClientAction::Ping => handle_ping(connection_id, state).await,
        ClientAction::Broadcast { event } => handle_broadcast(connection_id, event, state).await,
    }
}

async fn handle_ping(connection_id: &str, state: AppState) -> Result<Value, Error> {
    let pong = json!({
        "action": "pong",
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    if let Err(e) = state
        .websocket_service
        .send_message(connection_id, &pong.to_string())
        .await
    {
        error!("Failed to send pong response: {}", e);
        return Ok(response(500, Some(json!({"error": "Failed to send response"}))));
    }

    Ok(response(200, None))
}

async fn handle_broadcast(
    connection_id: &str,
    event: ChannelEvent,
    state: AppState,
) -> Result<Value, Error> {
    if matches!(
        event,
        ChannelEvent::SessionUpdated { .. } | ChannelEvent::SessionDeleted { .. }
    ) {
        warn!(
            "Connection {} tried to send store event {}",
            connection_id,
            event.name()
        );
        return Ok(response(
            400,
            Some(json!({"error": "Event cannot be sent by clients"})),
        ));
    }

    let connection = match state.websocket_service.get_connection(connection_id).await {
        Ok(Some(connection)) => connection,
        Ok(None) => {
            return Ok(response(
                403,
                Some(json!({"error": "Connection is not in a room"})),
            ))
        }
        Err(e) => {
            error!("Failed to look up connection {}: {}", connection_id, e);
            return Ok(response(500, Some(json!({"error": "Failed to relay event"}))));
        }
    };

    // The sender is whoever owns the connection, not whatever the client claims.
    let message = BroadcastMessage::new(&connection.player_id, event);
    let payload = serde_json::to_string(&message)?;

    match state
        .websocket_service
        .relay(&connection.session_id, Some(connection_id), &payload)
        .await
    {
        Ok(delivered) => {
            info!(
                "Relayed {} from {} to {} connections in room {}",
                message.event.name(),
                connection.player_id,
                delivered,
                connection.session_id
            );
            Ok(response(200, None))
        }
        Err(e) => {
            error!(
                "Failed to relay {} in room {}: {}",
                message.event.name(),
                connection.session_id,
                e
            );
            Ok(response(500, Some(json!({"error": "Failed to relay event"}))))
        }
    }
}
