pub mod broadcast_errors;
pub mod chat_repository_errors;
pub mod game_repository_errors;
