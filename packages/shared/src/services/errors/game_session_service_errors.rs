use crate::repositories::errors::game_repository_errors::GameSessionRepositoryError;

#[derive(Debug)]
pub enum GameSessionServiceError {
    GameNotFound,
    GameFull,
    GameAlreadyStarted,
    NotCreator,
    Conflict,
    RepositoryError(GameSessionRepositoryError),
    ValidationError(String),
}

impl std::fmt::Display for GameSessionServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameSessionServiceError::GameNotFound => write!(f, "Game not found"),
            GameSessionServiceError::GameFull => write!(f, "Game already has two players"),
            GameSessionServiceError::GameAlreadyStarted => write!(f, "Game has already started"),
            GameSessionServiceError::NotCreator => {
                write!(f, "Only the creator of a game can cancel it")
            }
            GameSessionServiceError::Conflict => {
                write!(f, "Game was modified concurrently, try again")
            }
            GameSessionServiceError::RepositoryError(err) => {
                write!(f, "Repository error: {}", err)
            }
            GameSessionServiceError::ValidationError(msg) => {
                write!(f, "Validation error: {}", msg)
            }
        }
    }
}

impl std::error::Error for GameSessionServiceError {}

impl From<GameSessionRepositoryError> for GameSessionServiceError {
    fn from(err: GameSessionRepositoryError) -> Self {
        match err {
            GameSessionRepositoryError::NotFound => GameSessionServiceError::GameNotFound,
            GameSessionRepositoryError::VersionConflict { .. } => GameSessionServiceError::Conflict,
            other => GameSessionServiceError::RepositoryError(other),
        }
    }
}
