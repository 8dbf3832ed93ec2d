#[derive(Debug)]
pub enum ChatMessageRepositoryError {
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for ChatMessageRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatMessageRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            ChatMessageRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for ChatMessageRepositoryError {}
