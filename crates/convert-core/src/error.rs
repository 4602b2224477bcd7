use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to parse document: {0}")]
    ParseError(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Missing required option: {0}")]
    MissingOption(&'static str),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Unsupported input: {0}")]
    Unsupported(String),

    #[error("Document operation failed: {0}")]
    OperationError(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
