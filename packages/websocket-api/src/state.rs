use std::sync::Arc;

use shared::repositories::game_repository::GameSessionRepository;
use shared::services::auth_service::AuthService;
use shared::services::websocket_service::WebSocketService;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub game_sessions: Arc<dyn GameSessionRepository>,
    pub websocket_service: Arc<WebSocketService>,
}
