//! Trait definitions for search domain abstractions.
//!
//! These traits enable dependency injection and easy testing through mocking.

use async_trait::async_trait;

use super::types::{IndexHit, IndexQuery, IndexStatus};
use crate::domain::models::Concept;

/// Error type for search operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    /// Malformed or empty search input. User-correctable.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The index service could not be reached.
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// The index answered, but not with something we understand.
    #[error("Unexpected index response: {0}")]
    IndexResponse(String),
}

impl From<solr::SolrError> for SearchError {
    fn from(e: solr::SolrError) -> Self {
        if e.is_unreachable() {
            SearchError::IndexUnavailable(e.to_string())
        } else {
            SearchError::IndexResponse(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// Adapter over the external full-text index. Owns no state.
///
/// Failures are propagated as-is; retry policy belongs to the caller.
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Execute a ranked query.
    ///
    /// Returns at most the client's configured maximum result count. In
    /// exact-code mode at most one exact hit is returned, followed by
    /// score-ranked near-matches.
    async fn search(&self, query: &IndexQuery) -> Result<Vec<IndexHit>>;

    /// Load (or replace) concepts of a vocabulary into the index.
    ///
    /// Returns the number of concepts accepted by the index.
    async fn bulk_load(&self, vocabulary_id: &str, concepts: &[Concept]) -> Result<usize>;

    /// Report the current state of the index.
    async fn status(&self) -> Result<IndexStatus>;
}
