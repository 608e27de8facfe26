use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage configuration error: {0}")]
    Config(String),

    #[error("invalid image payload: {0}")]
    InvalidInput(String),

    #[error("image not found: {0}")]
    NotFound(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}
