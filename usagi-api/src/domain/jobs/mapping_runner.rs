//! Background mapping of a batch of source codes.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::registry::JobContext;
use super::types::JobOutcome;
use crate::domain::models::{
    ColumnRoles, ConceptId, Filter, HintColumnType, MappingResult, ScoredMatch, SearchMode,
    SourceCode,
};
use crate::domain::search::{IndexClient, SearchError, SearchService};
use crate::repositories::MappingRepository;

const ATC_VOCABULARY: &str = "ATC";

/// A submitted mapping batch.
#[derive(Debug, Clone, Default)]
pub struct MappingJob {
    pub source_codes: Vec<SourceCode>,
    pub filters: Filter,
    pub column_roles: ColumnRoles,
    pub auto_assign: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct MappingPolicy {
    /// The top candidate is auto-assigned only when its score is strictly above this.
    pub auto_accept_threshold: f64,
}

impl Default for MappingPolicy {
    fn default() -> Self {
        Self {
            auto_accept_threshold: 0.95,
        }
    }
}

/// Maps source codes one at a time, persisting each result before moving on.
///
/// Cancellation is checked before every item, so an in-flight search and its
/// persist always finish. Results already persisted are never rolled back.
pub struct MappingJobRunner<I, R>
where
    I: IndexClient,
    R: MappingRepository,
{
    search: Arc<SearchService<I>>,
    repository: Arc<R>,
    policy: MappingPolicy,
}

impl<I, R> Clone for MappingJobRunner<I, R>
where
    I: IndexClient,
    R: MappingRepository,
{
    fn clone(&self) -> Self {
        Self {
            search: Arc::clone(&self.search),
            repository: Arc::clone(&self.repository),
            policy: self.policy,
        }
    }
}

impl<I, R> MappingJobRunner<I, R>
where
    I: IndexClient,
    R: MappingRepository,
{
    pub fn new(search: Arc<SearchService<I>>, repository: Arc<R>, policy: MappingPolicy) -> Self {
        Self {
            search,
            repository,
            policy,
        }
    }

    pub async fn run(&self, ctx: JobContext, job: MappingJob) -> JobOutcome {
        let owner = ctx.owner();

        if let Err(e) = self.repository.clear_mapping_session(owner).await {
            return JobOutcome::failed(format!("failed to reset mapping session: {}", e));
        }
        if let Err(e) = self.repository.save_source_codes(owner, &job.source_codes).await {
            return JobOutcome::failed(format!("failed to save source codes: {}", e));
        }

        // Mapping always ranks by name, whatever mode the defaults were saved in.
        let filters = Filter {
            search_mode: SearchMode::FreeText,
            search_string: None,
            ..job.filters.clone()
        };

        let mut failed_items = 0usize;
        for (position, source) in job.source_codes.iter().enumerate() {
            if ctx.is_cancelled() {
                info!(job_id = %ctx.job_id(), done = position, "Mapping cancelled");
                return JobOutcome::Cancelled;
            }

            let hints = self.resolve_hints(source, &job.column_roles).await;
            let term = search_term(source);

            let result = match self.search.search(&filters, term, &hints).await {
                Ok(candidates) => self.assign(source, candidates, job.auto_assign),
                Err(SearchError::IndexUnavailable(reason)) if position == 0 => {
                    return JobOutcome::failed(format!("index unavailable: {}", reason));
                }
                Err(e) => {
                    failed_items += 1;
                    warn!(
                        job_id = %ctx.job_id(),
                        source_code_id = source.id,
                        error = %e,
                        "Failed to map source code"
                    );
                    MappingResult::failed(source.id, e.to_string())
                }
            };

            if self.persist(&ctx, result).await {
                ctx.advance(1);
            } else {
                failed_items += 1;
            }
        }

        info!(
            job_id = %ctx.job_id(),
            items = job.source_codes.len(),
            failed_items,
            "Mapping finished"
        );
        JobOutcome::Completed
    }

    /// Store one result. When that fails, store a failure record in its place
    /// so the item still shows up as failed. Returns whether anything was
    /// stored; progress only counts items that can be read back.
    async fn persist(&self, ctx: &JobContext, result: MappingResult) -> bool {
        let owner = ctx.owner();
        let source_code_id = result.source_code_id;

        let Err(e) = self.repository.save_mapping_result(owner, &result).await else {
            return true;
        };
        warn!(
            job_id = %ctx.job_id(),
            source_code_id,
            error = %e,
            "Failed to persist mapping result"
        );

        let marker = MappingResult::failed(source_code_id, format!("failed to store result: {}", e));
        match self.repository.save_mapping_result(owner, &marker).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    job_id = %ctx.job_id(),
                    source_code_id,
                    error = %e,
                    "Dropping mapping result"
                );
                false
            }
        }
    }

    fn assign(&self, source: &SourceCode, candidates: Vec<ScoredMatch>, auto_assign: bool) -> MappingResult {
        let chosen = candidates
            .first()
            .filter(|top| auto_assign && top.score > self.policy.auto_accept_threshold)
            .map(ScoredMatch::concept_id);

        MappingResult {
            source_code_id: source.id,
            chosen_concept_id: chosen,
            auto_assigned: chosen.is_some(),
            candidates,
            failure: None,
        }
    }

    /// Concept ids the source system proposed for this code.
    ///
    /// ATC hints are looked up by exact code in the ATC vocabulary. A lookup
    /// that fails just contributes no hint.
    async fn resolve_hints(&self, source: &SourceCode, roles: &ColumnRoles) -> Vec<ConceptId> {
        match roles.column_type {
            HintColumnType::ConceptIds => source.hinted_concept_ids(roles),
            HintColumnType::Atc => {
                let mut ids = Vec::new();
                for code in source.hint_values(roles) {
                    let filters = Filter {
                        search_mode: SearchMode::ExactCode,
                        vocabulary_ids: BTreeSet::from([ATC_VOCABULARY.to_string()]),
                        include_invalid: true,
                        search_string: Some(code.clone()),
                        ..Default::default()
                    };

                    match self.search.search(&filters, &code, &[]).await {
                        Ok(matches) => ids.extend(
                            matches
                                .iter()
                                .filter(|m| m.concept.concept_code.eq_ignore_ascii_case(&code))
                                .map(ScoredMatch::concept_id),
                        ),
                        Err(e) => debug!(atc_code = %code, error = %e, "ATC hint not resolved"),
                    }
                }
                ids
            }
        }
    }
}

/// The free-text term for a source code: its name, or its code if unnamed.
fn search_term(source: &SourceCode) -> &str {
    let name = source.source_name.trim();
    if name.is_empty() {
        source.source_code.trim()
    } else {
        name
    }
}
