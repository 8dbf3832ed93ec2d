#[derive(Debug)]
pub enum BroadcastError {
    Serialization(String),
    Transport(String),
}

impl std::fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BroadcastError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            BroadcastError::Transport(msg) => write!(f, "Broadcast transport error: {}", msg),
        }
    }
}

impl std::error::Error for BroadcastError {}
