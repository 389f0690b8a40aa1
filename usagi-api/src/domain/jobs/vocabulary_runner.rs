//! Background load of a vocabulary into the search index.

use std::sync::Arc;

use tracing::{debug, info};

use super::registry::JobContext;
use super::types::JobOutcome;
use crate::domain::search::IndexClient;
use crate::repositories::MappingRepository;

pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Pushes a vocabulary's concepts to the index in fixed-size chunks.
///
/// Concepts are read one chunk at a time, keyed on the last concept id seen,
/// so memory stays bounded by the chunk size whatever the vocabulary's size.
/// Cancellation is checked before every chunk. A failed or cancelled load
/// leaves the chunks already sent in the index; progress tells how many.
pub struct VocabularyLoadJobRunner<I, R>
where
    I: IndexClient,
    R: MappingRepository,
{
    index: Arc<I>,
    repository: Arc<R>,
    chunk_size: usize,
}

impl<I, R> Clone for VocabularyLoadJobRunner<I, R>
where
    I: IndexClient,
    R: MappingRepository,
{
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            repository: Arc::clone(&self.repository),
            chunk_size: self.chunk_size,
        }
    }
}

impl<I, R> VocabularyLoadJobRunner<I, R>
where
    I: IndexClient,
    R: MappingRepository,
{
    pub fn new(index: Arc<I>, repository: Arc<R>, chunk_size: usize) -> Self {
        Self {
            index,
            repository,
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn run(&self, ctx: JobContext, vocabulary_id: String) -> JobOutcome {
        let total = match self
            .repository
            .count_vocabulary_concepts(&vocabulary_id)
            .await
        {
            Ok(total) => total,
            Err(e) => {
                return JobOutcome::failed(format!(
                    "failed to read vocabulary {}: {}",
                    vocabulary_id, e
                ))
            }
        };
        ctx.set_total(total);

        info!(
            job_id = %ctx.job_id(),
            vocabulary_id = %vocabulary_id,
            concepts = total,
            chunk_size = self.chunk_size,
            "Loading vocabulary into index"
        );

        let mut after = None;
        let mut chunk_no = 0;
        loop {
            if ctx.is_cancelled() {
                info!(job_id = %ctx.job_id(), chunks_loaded = chunk_no, "Vocabulary load cancelled");
                return JobOutcome::Cancelled;
            }
            chunk_no += 1;

            let chunk = match self
                .repository
                .load_vocabulary_concepts(&vocabulary_id, after, self.chunk_size)
                .await
            {
                Ok(chunk) => chunk,
                Err(e) => {
                    return JobOutcome::failed(format!(
                        "failed to read chunk {} of vocabulary {}: {}",
                        chunk_no, vocabulary_id, e
                    ))
                }
            };
            let Some(last) = chunk.last() else {
                break;
            };
            after = Some(last.concept_id);

            match self.index.bulk_load(&vocabulary_id, &chunk).await {
                Ok(indexed) => {
                    debug!(chunk = chunk_no, indexed, "Indexed chunk");
                    ctx.advance(chunk.len());
                }
                Err(e) => {
                    return JobOutcome::failed(format!("chunk {} failed: {}", chunk_no, e));
                }
            }

            if chunk.len() < self.chunk_size {
                break;
            }
        }

        JobOutcome::Completed
    }
}
