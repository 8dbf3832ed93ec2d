pub mod auth;
pub mod channel_event;
pub mod chat_message;
pub mod game_session;
pub mod move_record;
pub mod participant;
pub mod requests;
pub mod responses;
pub mod room_connection;
