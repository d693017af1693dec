//! Errors on the query path.
//!
//! Every failure a query can hit maps to one [`InsightError`] variant. The
//! HTTP layer turns the variant into a status code and reports the
//! `Display` text as a flat `{"error": "..."}` body.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    /// The vector index file does not exist.
    #[error("Vector store not found at {}", .0.display())]
    IndexNotFound(PathBuf),

    /// The index file exists but could not be read or decoded.
    #[error("Error loading vector store {}: {reason}", .path.display())]
    IndexCorrupt { path: PathBuf, reason: String },

    /// The environment variable carrying the LLM API key is unset or empty.
    #[error("LLM API key is missing: set {0}")]
    CredentialMissing(String),

    /// An embedding or completion request failed or returned an unusable body.
    #[error("upstream call failed: {0}")]
    UpstreamCallFailed(String),

    /// Retrieval found no document chunks to build the prompt context from.
    #[error("no relevant documents found in the vector store")]
    RetrievalEmpty,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for InsightError {
    fn from(err: reqwest::Error) -> Self {
        InsightError::UpstreamCallFailed(err.to_string())
    }
}

pub type InsightResult<T> = std::result::Result<T, InsightError>;
