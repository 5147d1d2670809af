//! Continuous collection: credential selection, pagination, ingestion
//! fan-out, and checkpointing.

use crate::api::ApiError;
use crate::storage::StorageError;

pub mod config;
pub mod driver;
pub mod ingest;

pub use driver::Collector;
pub use ingest::IngestionDispatcher;

/// Errors surfaced by the collection driver.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// Fatal API failure (non-503 error status, network, decode)
    #[error("API error: {0}")]
    Api(ApiError),

    /// Storage backend failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No usable credentials were provided
    #[error("no credentials available")]
    NoCredentials,

    /// Shutdown was requested; state has been checkpointed
    #[error("collection cancelled by shutdown request")]
    Cancelled,
}

impl From<ApiError> for CollectorError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Cancelled => CollectorError::Cancelled,
            other => CollectorError::Api(other),
        }
    }
}
