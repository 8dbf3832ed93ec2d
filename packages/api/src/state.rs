use std::sync::Arc;

use shared::services::auth_service::AuthService;
use shared::services::chat_service::ChatService;
use shared::services::chess_service::ChessService;
use shared::services::game_session_service::GameSessionService;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub game_session_service: Arc<GameSessionService>,
    pub chat_service: Arc<ChatService>,
    pub chess_service: ChessService,
}
