#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChessServiceError {
    InvalidPosition(String),
    InvalidSquare(String),
    IllegalMove(String),
    GameOver(String),
}

impl std::fmt::Display for ChessServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChessServiceError::InvalidPosition(msg) => write!(f, "Invalid position: {}", msg),
            ChessServiceError::InvalidSquare(square) => write!(f, "Invalid square: {}", square),
            ChessServiceError::IllegalMove(mv) => write!(f, "Illegal move: {}", mv),
            ChessServiceError::GameOver(msg) => write!(f, "Game over: {}", msg),
        }
    }
}

impl std::error::Error for ChessServiceError {}
