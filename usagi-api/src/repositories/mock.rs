//! In-memory mapping repository for testing.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use super::mapping_repo::MappingRepository;
use super::repo_error::RepositoryError;
use crate::domain::models::{
    Concept, ConceptId, FilterOptions, MappingResult, SavedVocabulary, SourceCode, UserId,
};

#[derive(Clone, Default)]
pub struct MockMappingRepository {
    source_codes: Arc<RwLock<HashMap<UserId, Vec<SourceCode>>>>,
    results: Arc<RwLock<HashMap<UserId, Vec<MappingResult>>>>,
    concepts: Arc<RwLock<HashMap<String, Vec<Concept>>>>,
    vocabularies: Arc<RwLock<HashMap<(UserId, String), SavedVocabulary>>>,
    failing_results: Arc<RwLock<BTreeSet<i64>>>,
    failing_once: Arc<RwLock<BTreeSet<i64>>>,
    fail_concept_loads: Arc<RwLock<bool>>,
    failing_page: Arc<RwLock<Option<usize>>>,
    page_reads: Arc<RwLock<Vec<(Option<ConceptId>, usize)>>>,
}

#[allow(dead_code)]
impl MockMappingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concepts served by `load_vocabulary_concepts`.
    pub fn with_concepts(self, vocabulary_id: &str, concepts: Vec<Concept>) -> Self {
        self.concepts
            .write()
            .unwrap()
            .insert(vocabulary_id.to_string(), concepts);
        self
    }

    /// Make every `save_mapping_result` for this source code fail.
    pub fn failing_result_for(self, source_code_id: i64) -> Self {
        self.failing_results.write().unwrap().insert(source_code_id);
        self
    }

    /// Make only the first `save_mapping_result` for this source code fail.
    pub fn failing_once_for(self, source_code_id: i64) -> Self {
        self.failing_once.write().unwrap().insert(source_code_id);
        self
    }

    /// Make counting and reading vocabulary concepts fail.
    pub fn failing_concept_loads(self) -> Self {
        *self.fail_concept_loads.write().unwrap() = true;
        self
    }

    /// Make the n-th (1-based) page read of vocabulary concepts fail.
    pub fn failing_concept_page(self, page: usize) -> Self {
        *self.failing_page.write().unwrap() = Some(page);
        self
    }

    /// `(after, limit)` of every page read so far.
    pub fn page_reads(&self) -> Vec<(Option<ConceptId>, usize)> {
        self.page_reads.read().unwrap().clone()
    }

    /// Saved results for test assertions.
    pub fn results_for(&self, owner: UserId) -> Vec<MappingResult> {
        self.results
            .read()
            .unwrap()
            .get(&owner)
            .cloned()
            .unwrap_or_default()
    }

    pub fn vocabulary(&self, owner: UserId, name: &str) -> Option<SavedVocabulary> {
        self.vocabularies
            .read()
            .unwrap()
            .get(&(owner, name.to_string()))
            .cloned()
    }
}

fn unavailable() -> RepositoryError {
    RepositoryError::DatabaseError(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl MappingRepository for MockMappingRepository {
    async fn clear_mapping_session(&self, owner: UserId) -> Result<(), RepositoryError> {
        self.source_codes.write().unwrap().remove(&owner);
        self.results.write().unwrap().remove(&owner);
        Ok(())
    }

    async fn save_source_codes(
        &self,
        owner: UserId,
        codes: &[SourceCode],
    ) -> Result<(), RepositoryError> {
        self.source_codes
            .write()
            .unwrap()
            .entry(owner)
            .or_default()
            .extend_from_slice(codes);
        Ok(())
    }

    async fn load_source_codes(&self, owner: UserId) -> Result<Vec<SourceCode>, RepositoryError> {
        Ok(self
            .source_codes
            .read()
            .unwrap()
            .get(&owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_mapping_result(
        &self,
        owner: UserId,
        result: &MappingResult,
    ) -> Result<(), RepositoryError> {
        if self
            .failing_results
            .read()
            .unwrap()
            .contains(&result.source_code_id)
            || self
                .failing_once
                .write()
                .unwrap()
                .remove(&result.source_code_id)
        {
            return Err(unavailable());
        }

        let mut results = self.results.write().unwrap();
        let owned = results.entry(owner).or_default();
        match owned
            .iter_mut()
            .find(|r| r.source_code_id == result.source_code_id)
        {
            Some(existing) => *existing = result.clone(),
            None => owned.push(result.clone()),
        }
        Ok(())
    }

    async fn load_saved_mapping_results(
        &self,
        owner: UserId,
    ) -> Result<Vec<MappingResult>, RepositoryError> {
        Ok(self.results_for(owner))
    }

    async fn count_vocabulary_concepts(
        &self,
        vocabulary_id: &str,
    ) -> Result<usize, RepositoryError> {
        if *self.fail_concept_loads.read().unwrap() {
            return Err(unavailable());
        }

        match self.concepts.read().unwrap().get(vocabulary_id) {
            Some(concepts) if !concepts.is_empty() => Ok(concepts.len()),
            _ => Err(RepositoryError::NotFound(format!(
                "vocabulary '{}'",
                vocabulary_id
            ))),
        }
    }

    async fn load_vocabulary_concepts(
        &self,
        vocabulary_id: &str,
        after: Option<ConceptId>,
        limit: usize,
    ) -> Result<Vec<Concept>, RepositoryError> {
        let page = {
            let mut reads = self.page_reads.write().unwrap();
            reads.push((after, limit));
            reads.len()
        };
        if *self.fail_concept_loads.read().unwrap()
            || *self.failing_page.read().unwrap() == Some(page)
        {
            return Err(unavailable());
        }

        let mut concepts: Vec<Concept> = self
            .concepts
            .read()
            .unwrap()
            .get(vocabulary_id)
            .into_iter()
            .flatten()
            .filter(|c| after.map_or(true, |after| c.concept_id > after))
            .cloned()
            .collect();
        concepts.sort_by_key(|c| c.concept_id);
        concepts.truncate(limit);
        Ok(concepts)
    }

    async fn save_vocabulary(
        &self,
        owner: UserId,
        vocabulary: &SavedVocabulary,
    ) -> Result<(), RepositoryError> {
        self.vocabularies
            .write()
            .unwrap()
            .insert((owner, vocabulary.name.clone()), vocabulary.clone());
        Ok(())
    }

    async fn load_vocabulary(
        &self,
        owner: UserId,
        name: &str,
    ) -> Result<SavedVocabulary, RepositoryError> {
        self.vocabulary(owner, name)
            .ok_or_else(|| RepositoryError::NotFound(format!("saved vocabulary '{}'", name)))
    }

    async fn load_filter_options(&self) -> Result<FilterOptions, RepositoryError> {
        let concepts = self.concepts.read().unwrap();
        let all = || concepts.values().flatten();

        let distinct = |field: fn(&Concept) -> &String| -> Vec<String> {
            all()
                .map(field)
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };

        Ok(FilterOptions {
            domain_ids: distinct(|c| &c.domain_id),
            vocabulary_ids: distinct(|c| &c.vocabulary_id),
            concept_class_ids: distinct(|c| &c.concept_class_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_mapping_result_replaces_same_source_code() {
        let repo = MockMappingRepository::new();
        let owner = UserId::new(1);

        repo.save_mapping_result(owner, &MappingResult::failed(1, "first"))
            .await
            .unwrap();
        let mut second = MappingResult::failed(1, "second");
        second.failure = None;
        second.chosen_concept_id = Some(ConceptId::new(9));
        repo.save_mapping_result(owner, &second).await.unwrap();

        let saved = repo.load_saved_mapping_results(owner).await.unwrap();
        assert_eq!(saved, vec![second]);
    }

    #[tokio::test]
    async fn clear_mapping_session_only_touches_owner() {
        let repo = MockMappingRepository::new();
        let alice = UserId::new(1);
        let bob = UserId::new(2);

        repo.save_mapping_result(alice, &MappingResult::failed(1, "x"))
            .await
            .unwrap();
        repo.save_mapping_result(bob, &MappingResult::failed(1, "x"))
            .await
            .unwrap();
        repo.clear_mapping_session(alice).await.unwrap();

        assert!(repo.results_for(alice).is_empty());
        assert_eq!(repo.results_for(bob).len(), 1);
    }

    #[tokio::test]
    async fn unknown_vocabulary_is_not_found() {
        let repo = MockMappingRepository::new();
        let err = repo.count_vocabulary_concepts("SNOMED").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn failing_once_recovers_on_retry() {
        let repo = MockMappingRepository::new().failing_once_for(4);
        let owner = UserId::new(1);

        assert!(repo
            .save_mapping_result(owner, &MappingResult::failed(4, "x"))
            .await
            .is_err());
        repo.save_mapping_result(owner, &MappingResult::failed(4, "x"))
            .await
            .unwrap();
        assert_eq!(repo.results_for(owner).len(), 1);
    }
}
