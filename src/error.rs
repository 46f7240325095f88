use thiserror::Error;

#[derive(Error, Debug)]
pub enum SemSearchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Covers missing credentials, API-reported errors and transport failures alike.
    #[error("{0}")]
    Embedding(String),

    #[error("Normalization error: {0}")]
    Normalize(String),

    #[error("Embedding store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Indexing queue error: {0}")]
    Queue(String),

    #[error("Semantic search is disabled")]
    Disabled,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unknown principal: {0}")]
    UnknownPrincipal(String),
}

impl SemSearchError {
    /// True for failures that originate in embedding generation.
    pub fn is_embedding(&self) -> bool {
        matches!(self, SemSearchError::Embedding(_))
    }
}

pub type Result<T> = std::result::Result<T, SemSearchError>;
