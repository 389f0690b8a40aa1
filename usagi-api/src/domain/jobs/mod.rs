//! Cancellable background jobs.
//!
//! - [`JobRegistry`] - at most one live job per (owner, kind), owns the
//!   cancellation tokens and the terminal state transition
//! - [`MappingJobRunner`] - maps a batch of source codes item by item
//! - [`VocabularyLoadJobRunner`] - loads a vocabulary into the index in chunks
//!
//! Runners never touch job state directly. They receive a [`JobContext`], poll
//! it for cancellation between items and report progress through it, then
//! return a [`JobOutcome`] that the registry turns into the final state.

mod mapping_runner;
mod registry;
mod types;
mod vocabulary_runner;

pub use mapping_runner::{MappingJob, MappingJobRunner, MappingPolicy};
pub use registry::{JobContext, JobRegistry};
pub use types::{Job, JobError, JobKind, JobOutcome, JobState, Progress};
pub use vocabulary_runner::{VocabularyLoadJobRunner, DEFAULT_CHUNK_SIZE};
