use crate::repositories::errors::broadcast_errors::BroadcastError;
use crate::repositories::errors::game_repository_errors::GameSessionRepositoryError;
use crate::services::errors::chess_service_errors::ChessServiceError;

/// Errors returned by a `SessionSynchronizer`.
///
/// Rule violations (`RuleViolation`, `NotYourTurn`, `NotYourPiece`) leave local
/// state untouched and are never sent to the opponent.
#[derive(Debug)]
pub enum SyncError {
    RuleViolation(ChessServiceError),
    NotYourTurn,
    NotYourPiece,
    PromotionPending,
    NoPendingPromotion,
    GameNotStarted,
    GameFinished,
    GameNotFinished,
    NoRematchInvite,
    SessionNotFound,
    NotAParticipant,
    StateDivergence(String),
    Conflict,
    Repository(GameSessionRepositoryError),
    Broadcast(BroadcastError),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::RuleViolation(err) => write!(f, "Rule violation: {}", err),
            SyncError::NotYourTurn => write!(f, "Not your turn"),
            SyncError::NotYourPiece => write!(f, "Not your piece"),
            SyncError::PromotionPending => write!(f, "A promotion choice is pending"),
            SyncError::NoPendingPromotion => write!(f, "No promotion is pending"),
            SyncError::GameNotStarted => write!(f, "Game has not started"),
            SyncError::GameFinished => write!(f, "Game is finished"),
            SyncError::GameNotFinished => write!(f, "Game is not finished"),
            SyncError::NoRematchInvite => write!(f, "No rematch invitation received"),
            SyncError::SessionNotFound => write!(f, "Session not found"),
            SyncError::NotAParticipant => write!(f, "Player is not a participant of the session"),
            SyncError::StateDivergence(msg) => write!(f, "State divergence: {}", msg),
            SyncError::Conflict => write!(f, "Session was modified concurrently"),
            SyncError::Repository(err) => write!(f, "Repository error: {}", err),
            SyncError::Broadcast(err) => write!(f, "Broadcast error: {}", err),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<GameSessionRepositoryError> for SyncError {
    fn from(err: GameSessionRepositoryError) -> Self {
        match err {
            GameSessionRepositoryError::NotFound => SyncError::SessionNotFound,
            GameSessionRepositoryError::VersionConflict { .. } => SyncError::Conflict,
            other => SyncError::Repository(other),
        }
    }
}

impl From<BroadcastError> for SyncError {
    fn from(err: BroadcastError) -> Self {
        SyncError::Broadcast(err)
    }
}
