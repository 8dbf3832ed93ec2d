pub mod auth_service_errors;
pub mod chat_service_errors;
pub mod chess_service_errors;
pub mod game_session_service_errors;
pub mod sync_errors;
