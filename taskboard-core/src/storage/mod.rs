#[cfg(feature = "local-store")]
pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::types::Board;

/// Abstract document store holding one whole-board document per user.
/// Implementations: MemoryDocumentStore (tests, ephemeral), LocalDocumentStore
/// (JSON files on disk), hosted stores behind the same contract.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// First board document owned by `user_id`, if any.
    async fn find_board_by_owner(&self, user_id: &str) -> Result<Option<Board>, StoreError>;

    /// Create a board document under its own id. Fails if the id is taken.
    async fn create_board(&self, board: &Board) -> Result<(), StoreError>;

    /// Replace an existing board document as a whole.
    async fn update_board(&self, board: &Board) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Board not found: {0}")]
    NotFound(String),

    #[error("Board already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid board id: {0}")]
    InvalidId(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Board ids become file names and URL segments; keep them to a safe
/// alphabet.
pub fn is_valid_board_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
