pub mod channel_repository;
pub mod chat_repository;
pub mod errors;
pub mod game_repository;
pub mod memory;
pub mod websocket_repository;
