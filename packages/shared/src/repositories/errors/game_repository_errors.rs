#[derive(Debug)]
pub enum GameSessionRepositoryError {
    NotFound,
    AlreadyExists,
    VersionConflict { expected: u64, actual: u64 },
    InvalidUpdate(String),
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for GameSessionRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameSessionRepositoryError::NotFound => write!(f, "Game session not found"),
            GameSessionRepositoryError::AlreadyExists => write!(f, "Game session already exists"),
            GameSessionRepositoryError::VersionConflict { expected, actual } => write!(
                f,
                "Game session was modified concurrently (expected version {}, found {})",
                expected, actual
            ),
            GameSessionRepositoryError::InvalidUpdate(msg) => write!(f, "Invalid update: {}", msg),
            GameSessionRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            GameSessionRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for GameSessionRepositoryError {}
