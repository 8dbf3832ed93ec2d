use aws_lambda_events::apigw::ApiGatewayWebsocketProxyRequest;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;

use shared::config::AppConfig;
use shared::repositories::game_repository::DynamoDbGameSessionRepository;
use shared::repositories::websocket_repository::DynamoDbWebSocketRepository;
use shared::services::auth_service::AuthService;
use shared::services::websocket_service::WebSocketService;
use websocket_api::{routes::websocket::websocket_handler, state::AppState};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .without_time()
        .init();

    let config = AppConfig::from_env()?;
    let aws_config = aws_config::load_from_env().await;
    let dynamodb_client = aws_sdk_dynamodb::Client::new(&aws_config);
    let api_gateway_client = DynamoDbWebSocketRepository::management_client(
        &aws_config,
        config.require_websocket_api_endpoint()?,
    );

    let websocket_repository = Arc::new(DynamoDbWebSocketRepository::new(
        dynamodb_client.clone(),
        api_gateway_client,
        &config.room_connections_table,
    ));
    let app_state = AppState {
        auth_service: Arc::new(AuthService::from_config(&config)?),
        game_sessions: Arc::new(DynamoDbGameSessionRepository::new(
            dynamodb_client,
            &config.game_sessions_table,
        )),
        websocket_service: Arc::new(WebSocketService::new(websocket_repository)),
    };

    run(service_fn(
        |event: LambdaEvent<ApiGatewayWebsocketProxyRequest>| {
            websocket_handler(event.payload, app_state.clone())
        },
    ))
    .await
}
