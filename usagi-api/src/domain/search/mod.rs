//! Concept search - ranked retrieval over the indexed vocabulary.
//!
//! A request flows through three pieces:
//!
//! - [`IndexClient`] - issues the query against the external full-text index
//!   (Solr in production, mocks in tests)
//! - [`scorer`] - pure ranking of the raw hits: filter double-check, per-query
//!   normalization, boost for concepts the source already proposed, stable sort
//! - [`SearchService`] - resolves the query term and ties the two together
//!
//! # Example
//!
//! ```ignore
//! use crate::domain::search::{SearchService, ScorerConfig, SolrIndexClient};
//!
//! let index = SolrIndexClient::new(solr_client, 50);
//! let service = SearchService::new(index, ScorerConfig::default());
//!
//! let matches = service.search(&filters, "serum glucose", &[]).await?;
//! ```
//!
//! Scores are only comparable within one result set. Ties are broken by
//! ascending concept id, so the same hits always rank the same way.

mod service;
mod traits;
mod types;

pub mod index;
pub mod scorer;

pub use index::SolrIndexClient;
pub use scorer::ScorerConfig;
pub use service::SearchService;
pub use traits::{IndexClient, SearchError};
pub use types::{is_code_pattern, IndexHit, IndexQuery, IndexStatus};
