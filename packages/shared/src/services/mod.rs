pub mod auth_service;
pub mod chat_service;
pub mod chess_service;
pub mod errors;
pub mod game_session_service;
pub mod session_synchronizer;
pub mod websocket_service;
