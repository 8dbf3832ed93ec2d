use lambda_http::{run, tracing, Error};
use std::env::set_var;
use std::sync::Arc;

use api::{app, state::AppState};
use shared::config::AppConfig;
use shared::repositories::chat_repository::DynamoDbChatMessageRepository;
use shared::repositories::game_repository::DynamoDbGameSessionRepository;
use shared::repositories::websocket_repository::DynamoDbWebSocketRepository;
use shared::services::auth_service::AuthService;
use shared::services::chat_service::ChatService;
use shared::services::chess_service::ChessService;
use shared::services::game_session_service::GameSessionService;
use shared::services::websocket_service::WebSocketService;

#[tokio::main]
async fn main() -> Result<(), Error> {
    set_var("AWS_LAMBDA_HTTP_IGNORE_STAGE_IN_PATH", "true");

    // required to enable CloudWatch error logging by the runtime
    tracing::init_default_subscriber();

    let config = AppConfig::from_env()?;
    let aws_config = aws_config::load_from_env().await;
    let dynamodb_client = aws_sdk_dynamodb::Client::new(&aws_config);

    // Room broadcasts go out over the WebSocket API's connections.
    let api_gateway_client = DynamoDbWebSocketRepository::management_client(
        &aws_config,
        config.require_websocket_api_endpoint()?,
    );
    let channel = Arc::new(WebSocketService::new(Arc::new(
        DynamoDbWebSocketRepository::new(
            dynamodb_client.clone(),
            api_gateway_client,
            &config.room_connections_table,
        ),
    )));

    let game_session_repository = Arc::new(DynamoDbGameSessionRepository::new(
        dynamodb_client.clone(),
        &config.game_sessions_table,
    ));
    let chat_repository = Arc::new(DynamoDbChatMessageRepository::new(
        dynamodb_client,
        &config.chat_messages_table,
    ));

    let app_state = AppState {
        auth_service: Arc::new(AuthService::from_config(&config)?),
        game_session_service: Arc::new(GameSessionService::new(
            game_session_repository,
            channel.clone(),
        )),
        chat_service: Arc::new(ChatService::new(chat_repository, channel)),
        chess_service: ChessService::new(),
    };

    run(app(app_state)).await
}
