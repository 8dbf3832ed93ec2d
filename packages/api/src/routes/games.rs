use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lambda_http::tracing::{debug, error};

use crate::{error::ApiError, middleware::auth::AuthenticatedUser, state::AppState};
use shared::models::game_session::{GameSession, GameSummary};
use shared::models::requests::{CreateGameRequest, LegalMovesQuery};
use shared::models::responses::LegalMovesResponse;
use shared::services::errors::game_session_service_errors::GameSessionServiceError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/games", post(create_game).get(list_games))
        .route("/games/{session_id}", get(get_game).delete(cancel_game))
        .route("/games/{session_id}/join", post(join_game))
        .route("/games/{session_id}/legal-moves", get(legal_moves))
}

async fn create_game(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Json(payload): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<GameSession>), ApiError> {
    let game = state
        .game_session_service
        .create_game(&authenticated_user.identity(), payload.color)
        .await
        .map_err(|e| {
            error!(
                "Failed to create game for user {}: {}",
                authenticated_user.user_id, e
            );
            ApiError::from(e)
        })?;

    Ok((StatusCode::CREATED, Json(game)))
}

async fn list_games(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
) -> Result<Json<Vec<GameSummary>>, ApiError> {
    let summaries = state
        .game_session_service
        .list_games_for_player(&authenticated_user.user_id)
        .await?;

    debug!(
        "Listed {} finished games for user {}",
        summaries.len(),
        authenticated_user.user_id
    );
    Ok(Json(summaries))
}

async fn get_game(
    State(state): State<AppState>,
    _authenticated_user: AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<GameSession>, ApiError> {
    state
        .game_session_service
        .get_game_session(&session_id)
        .await?
        .map(Json)
        .ok_or(ApiError::GameSessionService(
            GameSessionServiceError::GameNotFound,
        ))
}

async fn join_game(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<GameSession>, ApiError> {
    let game = state
        .game_session_service
        .join_game(&session_id, &authenticated_user.identity())
        .await
        .map_err(|e| {
            debug!(
                "User {} could not join game {}: {}",
                authenticated_user.user_id, session_id, e
            );
            ApiError::from(e)
        })?;

    Ok(Json(game))
}

async fn cancel_game(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .game_session_service
        .cancel_game(&session_id, &authenticated_user.user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Moves the side to move can make, optionally only from `?square=`.
async fn legal_moves(
    State(state): State<AppState>,
    _authenticated_user: AuthenticatedUser,
    Path(session_id): Path<String>,
    Query(query): Query<LegalMovesQuery>,
) -> Result<Json<LegalMovesResponse>, ApiError> {
    let game = state
        .game_session_service
        .get_game_session(&session_id)
        .await?
        .ok_or(ApiError::GameSessionService(
            GameSessionServiceError::GameNotFound,
        ))?;

    let moves = if game.status.is_finished() {
        vec![]
    } else {
        state
            .chess_service
            .legal_moves(&game.position, query.square.as_deref())?
    };

    Ok(Json(LegalMovesResponse {
        square: query.square,
        moves,
    }))
}
