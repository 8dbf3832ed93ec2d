use aws_lambda_events::apigw::ApiGatewayWebsocketProxyRequest;
use lambda_runtime::Error;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::routes::{connection, default, response};
use crate::state::AppState;

pub async fn websocket_handler(
    event: ApiGatewayWebsocketProxyRequest,
    state: AppState,
) -> Result<Value, Error> {
    let route_key = event.request_context.route_key.as_deref().unwrap_or("");
    let connection_id = event
        .request_context
        .connection_id
        .as_deref()
        .unwrap_or("");

    debug!(
        "Processing route_key: {}, connection_id: {}",
        route_key, connection_id
    );

    match route_key {
        "$connect" => connection::handle_connect(&event, state).await,
        "$disconnect" => connection::handle_disconnect(connection_id, state).await,
        "$default" => default::handle_default_message(&event, state).await,
        _ => {
            error!("Unknown route key: {}", route_key);
            Ok(response(400, Some(json!({"error": "Unknown route"}))))
        }
    }
}
