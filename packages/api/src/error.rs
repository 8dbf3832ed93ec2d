use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lambda_http::tracing::error;
use shared::models::responses::ErrorResponse;
use shared::services::errors::{
    auth_service_errors::AuthServiceError, chat_service_errors::ChatServiceError,
    chess_service_errors::ChessServiceError, game_session_service_errors::GameSessionServiceError,
};

#[derive(Debug)]
pub enum ApiError {
    AuthService(AuthServiceError),
    GameSessionService(GameSessionServiceError),
    ChatService(ChatServiceError),
    ChessService(ChessServiceError),
    Unauthorized,
    Forbidden,
    NotFound,
}

impl From<AuthServiceError> for ApiError {
    fn from(error: AuthServiceError) -> Self {
        ApiError::AuthService(error)
    }
}

impl From<GameSessionServiceError> for ApiError {
    fn from(error: GameSessionServiceError) -> Self {
        ApiError::GameSessionService(error)
    }
}

impl From<ChatServiceError> for ApiError {
    fn from(error: ChatServiceError) -> Self {
        ApiError::ChatService(error)
    }
}

impl From<ChessServiceError> for ApiError {
    fn from(error: ChessServiceError) -> Self {
        ApiError::ChessService(error)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AuthService(AuthServiceError::InvalidToken | AuthServiceError::ExpiredToken) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::AuthService(AuthServiceError::JwtError(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,

            ApiError::GameSessionService(GameSessionServiceError::GameNotFound) => {
                StatusCode::NOT_FOUND
            }
            ApiError::GameSessionService(
                GameSessionServiceError::GameFull
                | GameSessionServiceError::GameAlreadyStarted
                | GameSessionServiceError::Conflict,
            ) => StatusCode::CONFLICT,
            ApiError::GameSessionService(GameSessionServiceError::NotCreator) => {
                StatusCode::FORBIDDEN
            }
            ApiError::GameSessionService(GameSessionServiceError::ValidationError(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::GameSessionService(GameSessionServiceError::RepositoryError(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            ApiError::ChatService(ChatServiceError::ValidationError(_)) => StatusCode::BAD_REQUEST,
            ApiError::ChatService(ChatServiceError::RepositoryError(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ChatService(ChatServiceError::BroadcastError(_)) => StatusCode::BAD_GATEWAY,

            ApiError::ChessService(
                ChessServiceError::InvalidSquare(_)
                | ChessServiceError::IllegalMove(_)
                | ChessServiceError::GameOver(_),
            ) => StatusCode::BAD_REQUEST,
            ApiError::ChessService(ChessServiceError::InvalidPosition(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::AuthService(e) => e.to_string(),
            ApiError::GameSessionService(e) => e.to_string(),
            ApiError::ChatService(e) => e.to_string(),
            ApiError::ChessService(e) => e.to_string(),
            ApiError::Unauthorized => "Missing or malformed bearer token".to_string(),
            ApiError::Forbidden => "Not a participant of this game".to_string(),
            ApiError::NotFound => "Not found".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        }

        // Internal details stay in the logs.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.message()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
