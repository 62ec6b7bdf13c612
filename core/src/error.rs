/// Error types for the messaging core
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User {user_id} is not a participant of conversation {conversation_id}")]
    NotParticipant { user_id: Uuid, conversation_id: Uuid },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ChatError {
    /// Shorthand used by the stores when a sled call fails.
    pub fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        ChatError::Storage(format!("{}: {}", context, err))
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
