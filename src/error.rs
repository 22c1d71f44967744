/// Error types shared by every layer of the server.
///
/// Tool handlers turn these into `{success: false, error, error_type}`
/// payloads, so `error_type()` is part of the wire contract.
use thiserror::Error;

pub type Result<T, E = RagError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    FileNotFound(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Directory is already being processed: {0}")]
    AlreadyProcessing(String),

    #[error("Directory not processed: {0}")]
    NotProcessed(String),

    #[error("Directory not fully initialized: {0}")]
    NotInitialized(String),

    #[error("File too large: {size_mb:.2}MB (max: {max_mb}MB)")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    #[error("unsupported document type: {0}")]
    Unsupported(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Classification reported to MCP clients alongside the message.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::Config(_) => "ValidationError",
            Self::FileNotFound(_) => "FileNotFoundError",
            Self::NotFound(_) => "NotFoundError",
            Self::AlreadyProcessing(_) => "AlreadyProcessingError",
            Self::NotProcessed(_) => "NotProcessedError",
            Self::NotInitialized(_) => "NotInitializedError",
            Self::FileTooLarge { .. } => "FileTooLargeError",
            Self::Unsupported(_) => "UnsupportedError",
            Self::Extraction(_) => "ExtractionError",
            Self::Embedding(_) => "EmbeddingError",
            Self::Generation(_) => "GenerationError",
            Self::Storage(_) => "StorageError",
            Self::Io(_) => "IoError",
        }
    }

    /// Whether the failure came from caller input rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Config(_)
                | Self::AlreadyProcessing(_)
                | Self::NotProcessed(_)
                | Self::NotInitialized(_)
                | Self::FileTooLarge { .. }
        )
    }
}
