//! Search service combining the index client and the scorer.

use tracing::debug;

use super::scorer::{self, ScorerConfig};
use super::traits::{IndexClient, Result};
use super::types::IndexQuery;
use crate::domain::models::{ConceptId, Filter, ScoredMatch, SearchMode};

/// Answers interactive search requests.
///
/// Errors from the index are returned unchanged; interactive search fails fast
/// and leaves retrying to the caller.
///
/// # Examples
///
/// ```ignore
/// let service = SearchService::new(index, ScorerConfig::default());
/// let matches = service.search(&Filter::default(), "aspirin", &[]).await?;
/// ```
pub struct SearchService<I>
where
    I: IndexClient,
{
    index: I,
    config: ScorerConfig,
}

impl<I> SearchService<I>
where
    I: IndexClient,
{
    /// Create a new search service.
    pub fn new(index: I, config: ScorerConfig) -> Self {
        Self { index, config }
    }

    /// Create a search service with default configuration.
    pub fn with_defaults(index: I) -> Self {
        Self::new(index, ScorerConfig::default())
    }

    /// Rank concepts for `term` under `filters`.
    ///
    /// In exact-code mode the query text is `filters.search_string` and `term`
    /// is ignored. Concepts in `auto_assigned` get a small score boost.
    pub async fn search(
        &self,
        filters: &Filter,
        term: &str,
        auto_assigned: &[ConceptId],
    ) -> Result<Vec<ScoredMatch>> {
        let text = match filters.search_mode {
            SearchMode::ExactCode => filters.search_string.as_deref().unwrap_or_default(),
            SearchMode::FreeText => term,
        };

        let query = IndexQuery::new(filters.clone(), text)?;
        let hits = self.index.search(&query).await?;
        let raw_hits = hits.len();

        let matches = scorer::score(hits, filters, auto_assigned, &self.config);
        debug!(
            mode = ?query.mode(),
            raw_hits,
            matches = matches.len(),
            "Search completed"
        );

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::search::index::MockIndexClient;
    use crate::domain::search::traits::SearchError;
    use crate::domain::search::types::IndexHit;
    use crate::domain::models::{Concept, StandardConcept};
    use std::collections::BTreeSet;

    fn concept(id: i64, name: &str, code: &str) -> Concept {
        Concept {
            concept_id: ConceptId::new(id),
            concept_name: name.to_string(),
            concept_code: code.to_string(),
            domain_id: "Drug".to_string(),
            vocabulary_id: "RxNorm".to_string(),
            concept_class_id: "Ingredient".to_string(),
            standard_concept: StandardConcept::Standard,
            invalid_reason: None,
        }
    }

    fn hit(id: i64, relevance: f64) -> IndexHit {
        IndexHit {
            concept: concept(id, &format!("Concept {}", id), &id.to_string()),
            relevance,
            matched_fields: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn free_text_search_ranks_hits() {
        let index = MockIndexClient::new().with_hits(vec![hit(3, 0.3), hit(2, 0.9), hit(1, 0.9)]);
        let service = SearchService::with_defaults(index.clone());
        let filters = Filter {
            standard_concept_only: true,
            ..Default::default()
        };

        let matches = service.search(&filters, "aspirin", &[]).await.unwrap();

        let ids: Vec<i64> = matches.iter().map(|m| m.concept_id().as_i64()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!((matches[2].score - 0.33).abs() < 0.01);
        assert_eq!(index.queries(), vec!["aspirin".to_string()]);
    }

    #[tokio::test]
    async fn exact_code_uses_search_string_and_tolerates_no_hits() {
        let index = MockIndexClient::new();
        let service = SearchService::with_defaults(index.clone());
        let filters = Filter {
            search_mode: SearchMode::ExactCode,
            search_string: Some("J45.0".to_string()),
            ..Default::default()
        };

        let matches = service.search(&filters, "ignored term", &[]).await.unwrap();

        assert!(matches.is_empty());
        assert_eq!(index.queries(), vec!["J45.0".to_string()]);
    }

    #[tokio::test]
    async fn exact_code_without_search_string_is_invalid() {
        let service = SearchService::with_defaults(MockIndexClient::new());
        let filters = Filter {
            search_mode: SearchMode::ExactCode,
            ..Default::default()
        };

        let err = service.search(&filters, "J45.0", &[]).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn blank_free_text_is_invalid_and_never_reaches_index() {
        let index = MockIndexClient::new();
        let service = SearchService::with_defaults(index.clone());

        let err = service.search(&Filter::default(), "  ", &[]).await.unwrap_err();

        assert!(matches!(err, SearchError::InvalidQuery(_)));
        assert_eq!(index.call_count(), 0);
    }

    #[tokio::test]
    async fn index_unavailable_propagates_without_retry() {
        let index = MockIndexClient::new().unavailable();
        let service = SearchService::with_defaults(index.clone());

        let err = service.search(&Filter::default(), "aspirin", &[]).await.unwrap_err();

        assert!(matches!(err, SearchError::IndexUnavailable(_)));
        assert_eq!(index.call_count(), 1);
    }

    #[tokio::test]
    async fn auto_assigned_ids_are_boosted() {
        let index = MockIndexClient::new().with_hits(vec![hit(1, 1.0), hit(2, 0.5)]);
        let service = SearchService::with_defaults(index);

        let matches = service
            .search(&Filter::default(), "aspirin", &[ConceptId::new(2)])
            .await
            .unwrap();

        assert!((matches[1].score - 0.55).abs() < 1e-9);
    }
}
