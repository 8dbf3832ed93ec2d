use crate::repositories::errors::broadcast_errors::BroadcastError;
use crate::repositories::errors::chat_repository_errors::ChatMessageRepositoryError;

#[derive(Debug)]
pub enum ChatServiceError {
    ValidationError(String),
    RepositoryError(ChatMessageRepositoryError),
    BroadcastError(BroadcastError),
}

impl std::fmt::Display for ChatServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatServiceError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ChatServiceError::RepositoryError(err) => write!(f, "Repository error: {}", err),
            ChatServiceError::BroadcastError(err) => write!(f, "Broadcast error: {}", err),
        }
    }
}

impl std::error::Error for ChatServiceError {}

impl From<ChatMessageRepositoryError> for ChatServiceError {
    fn from(err: ChatMessageRepositoryError) -> Self {
        ChatServiceError::RepositoryError(err)
    }
}

impl From<BroadcastError> for ChatServiceError {
    fn from(err: BroadcastError) -> Self {
        ChatServiceError::BroadcastError(err)
    }
}
