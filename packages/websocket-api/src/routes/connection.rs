use aws_lambda_events::apigw::ApiGatewayWebsocketProxyRequest;
use lambda_runtime::Error;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::routes::response;
use crate::state::AppState;
use shared::models::room_connection::RoomConnection;

/// Subscribes the connection to the room named by `?session_id=`.
///
/// The player is the subject of the `?token=` JWT and must be seated in the
/// session, so messages relayed later carry an identity the room can trust.
pub async fn handle_connect(
    event: &ApiGatewayWebsocketProxyRequest,
    state: AppState,
) -> Result<Value, Error> {
    let connection_id = event
        .request_context
        .connection_id
        .as_deref()
        .unwrap_or("");
    info!("WebSocket connection established: {}", connection_id);

    let Some(session_id) = event.query_string_parameters.first("session_id") else {
        debug!("Rejecting connection {} without session_id", connection_id);
        return Ok(response(
            400,
            Some(json!({"error": "session_id query parameter is required"})),
        ));
    };

    let Some(token) = event.query_string_parameters.first("token") else {
        debug!("Rejecting connection {} without token", connection_id);
        return Ok(response(
            401,
            Some(json!({"error": "token query parameter is required"})),
        ));
    };
    let player = match state.auth_service.identity(token) {
        Ok(player) => player,
        Err(e) => {
            warn!("Rejecting connection {}: {}", connection_id, e);
            return Ok(response(401, Some(json!({"error": "Invalid or expired token"}))));
        }
    };

    match state.game_sessions.get_game_session(session_id).await {
        Ok(Some(session)) if session.participant(&player.id).is_some() => {}
        Ok(Some(_)) => {
            warn!(
                "Rejecting connection {}: {} is not playing session {}",
                connection_id, player.id, session_id
            );
            return Ok(response(
                403,
                Some(json!({"error": "You are not a participant of this game"})),
            ));
        }
        Ok(None) => {
            return Ok(response(404, Some(json!({"error": "Game not found"}))));
        }
        Err(e) => {
            error!("Failed to load session {}: {}", session_id, e);
            return Ok(response(500, Some(json!({"error": "Failed to load game"}))));
        }
    }

    let connection = RoomConnection::new(connection_id, session_id, &player.id);
    if let Err(e) = state.websocket_service.join_room(&connection).await {
        error!("Failed to store connection {}: {}", connection_id, e);
        return Ok(response(
            500,
            Some(json!({"error": "Failed to store connection"})),
        ));
    }

    Ok(response(200, None))
}

pub async fn handle_disconnect(connection_id: &str, state: AppState) -> Result<Value, Error> {
    info!("WebSocket connection disconnected: {}", connection_id);

    if let Err(e) = state.websocket_service.leave_room(connection_id).await {
        error!("Failed to remove connection {}: {}", connection_id, e);
    }

    Ok(response(200, None))
}
