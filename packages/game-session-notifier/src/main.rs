use aws_lambda_events::event::dynamodb::Event;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;
use tracing::info;

use game_session_notifier::processor::SessionChangeNotifier;
use shared::config::AppConfig;
use shared::repositories::websocket_repository::DynamoDbWebSocketRepository;
use shared::services::websocket_service::WebSocketService;

async fn function_handler(
    event: LambdaEvent<Event>,
    notifier: Arc<SessionChangeNotifier>,
) -> Result<(), Error> {
    let (event, _context) = event.into_parts();
    info!("Processing {} records", event.records.len());

    notifier.handle_event(event).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
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
    let websocket_service = WebSocketService::new(Arc::new(DynamoDbWebSocketRepository::new(
        dynamodb_client,
        api_gateway_client,
        &config.room_connections_table,
    )));
    let notifier = Arc::new(SessionChangeNotifier::new(Arc::new(websocket_service)));

    info!("Game session notifier Lambda function starting");

    run(service_fn(|event: LambdaEvent<Event>| {
        function_handler(event, notifier.clone())
    }))
    .await
}
