//! The mapping engine's entry point for request handlers.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::domain::jobs::{
    Job, JobError, JobKind, JobRegistry, MappingJob, MappingJobRunner, MappingPolicy,
    VocabularyLoadJobRunner, DEFAULT_CHUNK_SIZE,
};
use crate::domain::models::{
    ConceptId, Filter, FilterOptions, JobId, SavedMapping, SavedVocabulary, ScoredMatch, UserId,
};
use crate::domain::search::{IndexClient, IndexStatus, ScorerConfig, SearchError, SearchService};
use crate::repositories::{MappingRepository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum MappingServiceError {
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, MappingServiceError>;

/// Tunables for search ranking and the background jobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingSettings {
    pub scorer: ScorerConfig,
    pub policy: MappingPolicy,
    pub load_chunk_size: Option<usize>,
}

/// Search, mapping jobs and vocabulary loads behind one handle.
///
/// Owns the [`JobRegistry`], so every caller sharing a service instance sees
/// the same jobs.
pub struct MappingService<I, R>
where
    I: IndexClient + Clone + 'static,
    R: MappingRepository + 'static,
{
    registry: JobRegistry,
    search: Arc<SearchService<I>>,
    index: Arc<I>,
    repository: Arc<R>,
    mapping_runner: MappingJobRunner<I, R>,
    vocabulary_runner: VocabularyLoadJobRunner<I, R>,
}

impl<I, R> MappingService<I, R>
where
    I: IndexClient + Clone + 'static,
    R: MappingRepository + 'static,
{
    pub fn new(index: I, repository: R, settings: MappingSettings) -> Self {
        let search = Arc::new(SearchService::new(index.clone(), settings.scorer));
        let index = Arc::new(index);
        let repository = Arc::new(repository);

        Self {
            registry: JobRegistry::new(),
            mapping_runner: MappingJobRunner::new(
                Arc::clone(&search),
                Arc::clone(&repository),
                settings.policy,
            ),
            vocabulary_runner: VocabularyLoadJobRunner::new(
                Arc::clone(&index),
                Arc::clone(&repository),
                settings.load_chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            ),
            search,
            index,
            repository,
        }
    }

    /// Start mapping `job.source_codes` for `owner` in the background.
    ///
    /// Replaces the owner's previous mapping session once the job starts.
    pub fn start_mapping(&self, owner: UserId, job: MappingJob) -> Result<JobId> {
        let mut seen = HashSet::new();
        if let Some(dup) = job.source_codes.iter().find(|c| !seen.insert(c.id)) {
            return Err(MappingServiceError::InvalidInput(format!(
                "duplicate source code id {}",
                dup.id
            )));
        }

        let runner = self.mapping_runner.clone();
        let total = job.source_codes.len();
        let submitted = self
            .registry
            .submit(owner, JobKind::MapCodes, total, move |ctx| async move {
                runner.run(ctx, job).await
            })?;

        Ok(submitted.job_id)
    }

    pub fn mapping_status(&self, owner: UserId) -> Option<Job> {
        self.registry.status(owner, JobKind::MapCodes)
    }

    pub fn cancel_mapping(&self, owner: UserId) -> bool {
        self.registry.cancel(owner, JobKind::MapCodes)
    }

    pub async fn search_concepts(
        &self,
        filters: &Filter,
        term: &str,
        auto_assigned: &[ConceptId],
    ) -> Result<Vec<ScoredMatch>> {
        Ok(self.search.search(filters, term, auto_assigned).await?)
    }

    /// Start loading `vocabulary_id` into the index in the background.
    pub fn start_vocabulary_load(&self, owner: UserId, vocabulary_id: &str) -> Result<JobId> {
        let vocabulary_id = vocabulary_id.trim();
        if vocabulary_id.is_empty() {
            return Err(MappingServiceError::InvalidInput(
                "vocabulary id is required".to_string(),
            ));
        }

        let runner = self.vocabulary_runner.clone();
        let vocabulary_id = vocabulary_id.to_string();
        let submitted = self
            .registry
            .submit(owner, JobKind::LoadVocab, 0, move |ctx| async move {
                runner.run(ctx, vocabulary_id).await
            })?;

        Ok(submitted.job_id)
    }

    pub fn vocabulary_load_status(&self, owner: UserId) -> Option<Job> {
        self.registry.status(owner, JobKind::LoadVocab)
    }

    pub fn cancel_vocabulary_load(&self, owner: UserId) -> bool {
        self.registry.cancel(owner, JobKind::LoadVocab)
    }

    /// The owner's latest batch with whatever results have been persisted so far.
    pub async fn saved_mapping_results(&self, owner: UserId) -> Result<SavedMapping> {
        let source_codes = self.repository.load_source_codes(owner).await?;
        let results = self.repository.load_saved_mapping_results(owner).await?;

        Ok(SavedMapping {
            source_codes,
            results,
        })
    }

    pub async fn save_mapped_codes(&self, owner: UserId, vocabulary: SavedVocabulary) -> Result<()> {
        if vocabulary.name.trim().is_empty() {
            return Err(MappingServiceError::InvalidInput(
                "vocabulary name is required".to_string(),
            ));
        }

        self.repository.save_vocabulary(owner, &vocabulary).await?;
        info!(
            owner = %owner,
            name = %vocabulary.name,
            mappings = vocabulary.mappings.len(),
            "Saved mapped codes"
        );
        Ok(())
    }

    /// Make a saved vocabulary the owner's current mapping session.
    ///
    /// Replaces the session's source codes and results, so it is refused
    /// while a mapping job of the owner is still running.
    pub async fn load_saved_vocabulary(&self, owner: UserId, name: &str) -> Result<SavedMapping> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MappingServiceError::InvalidInput(
                "vocabulary name is required".to_string(),
            ));
        }
        if self
            .mapping_status(owner)
            .is_some_and(|job| !job.state.is_terminal())
        {
            return Err(JobError::AlreadyRunning {
                owner,
                kind: JobKind::MapCodes,
            }
            .into());
        }

        let vocabulary = self.repository.load_vocabulary(owner, name).await?;

        self.repository.clear_mapping_session(owner).await?;
        self.repository
            .save_source_codes(owner, &vocabulary.source_codes)
            .await?;
        for result in &vocabulary.mappings {
            self.repository.save_mapping_result(owner, result).await?;
        }

        info!(
            owner = %owner,
            name = %vocabulary.name,
            mappings = vocabulary.mappings.len(),
            "Loaded saved vocabulary"
        );
        Ok(SavedMapping {
            source_codes: vocabulary.source_codes,
            results: vocabulary.mappings,
        })
    }

    pub async fn filter_options(&self) -> Result<FilterOptions> {
        Ok(self.repository.load_filter_options().await?)
    }

    pub async fn index_status(&self) -> Result<IndexStatus> {
        Ok(self.index.status().await?)
    }
}
