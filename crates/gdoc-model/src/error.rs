use thiserror::Error;

/// Top-level error type for the gdoc workspace.
#[derive(Debug, Error)]
pub enum DocError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed document: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pristine archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, DocError>;
