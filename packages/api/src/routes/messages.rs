use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use lambda_http::tracing::error;

use crate::{error::ApiError, middleware::auth::AuthenticatedUser, state::AppState};
use shared::models::chat_message::ChatMessage;
use shared::models::requests::SendMessageRequest;
use shared::services::errors::game_session_service_errors::GameSessionServiceError;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/games/{session_id}/messages",
        get(list_messages).post(send_message),
    )
}

/// Only the two players of a game may read or write its chat.
async fn ensure_participant(
    state: &AppState,
    session_id: &str,
    user_id: &str,
) -> Result<(), ApiError> {
    let game = state
        .game_session_service
        .get_game_session(session_id)
        .await?
        .ok_or(ApiError::GameSessionService(
            GameSessionServiceError::GameNotFound,
        ))?;

    match game.participant(user_id) {
        Some(_) => Ok(()),
        None => Err(ApiError::Forbidden),
    }
}

async fn list_messages(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    ensure_participant(&state, &session_id, &authenticated_user.user_id).await?;

    let messages = state.chat_service.history(&session_id).await?;
    Ok(Json(messages))
}

async fn send_message(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(session_id): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    ensure_participant(&state, &session_id, &authenticated_user.user_id).await?;

    let message = state
        .chat_service
        .send_message(&session_id, &authenticated_user.identity(), &payload.text)
        .await
        .map_err(|e| {
            error!(
                "Failed to send message from {} to game {}: {}",
                authenticated_user.user_id, session_id, e
            );
            ApiError::from(e)
        })?;

    Ok((StatusCode::CREATED, Json(message)))
}
