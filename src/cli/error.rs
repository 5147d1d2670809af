//! CLI error types and conversions

use crate::auth::AuthError;
use crate::collector::CollectorError;
use crate::storage::StorageError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Credential error
    #[error("auth error: {0}")]
    AuthError(#[from] AuthError),

    /// Collection error
    #[error("collection error: {0}")]
    CollectorError(#[from] CollectorError),

    /// Storage error
    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
