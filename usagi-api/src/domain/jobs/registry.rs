//! Process-wide table of background jobs keyed by (owner, kind).

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::types::{Job, JobError, JobKind, JobOutcome, JobState, Progress};
use crate::domain::models::{JobId, UserId};

type JobKey = (UserId, JobKind);

struct Entry {
    job: Job,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    jobs: Mutex<HashMap<JobKey, Entry>>,
    next_id: AtomicU64,
}

/// Tracks at most one live job per (owner, kind).
///
/// Admission is a single check-and-insert under the table lock, so two
/// concurrent submitters can never both see their job become active. The
/// registry owns every job's cancellation token and performs the one terminal
/// transition after the job's work has returned.
///
/// Terminal snapshots stay visible through [`JobRegistry::status`] until the
/// next submission for the same key replaces them.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<Inner>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<JobKey, Entry>> {
        // Every update under the lock is a plain assignment, so a poisoned table is still consistent.
        self.inner.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit and spawn a job.
    ///
    /// Fails with [`JobError::AlreadyRunning`] if a non-terminal job exists for
    /// `(owner, kind)`. Otherwise `work` runs on its own task with a fresh
    /// [`JobContext`]; whatever [`JobOutcome`] it returns becomes the job's
    /// terminal state. A panicking job ends `Failed`.
    pub fn submit<F, Fut>(
        &self,
        owner: UserId,
        kind: JobKind,
        total: usize,
        work: F,
    ) -> Result<Job, JobError>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        let (job, ctx) = {
            let mut jobs = self.table();

            if let Some(existing) = jobs.get(&(owner, kind)) {
                if !existing.job.state.is_terminal() {
                    return Err(JobError::AlreadyRunning { owner, kind });
                }
            }

            let job_id = JobId::new(self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            let cancel = CancellationToken::new();
            let mut job = Job {
                job_id,
                owner,
                kind,
                state: JobState::Pending,
                created_at: OffsetDateTime::now_utc(),
                finished_at: None,
                progress: Progress { done: 0, total },
                error: None,
            };
            // Dispatch happens right below; nobody observes the pending state.
            job.state = JobState::Active;

            jobs.insert(
                (owner, kind),
                Entry {
                    job: job.clone(),
                    cancel: cancel.clone(),
                },
            );

            let ctx = JobContext {
                job_id,
                owner,
                kind,
                cancel,
                registry: self.clone(),
            };
            (job, ctx)
        };

        info!(job_id = %job.job_id, owner = %owner, kind = %kind, total, "Job started");

        let registry = self.clone();
        let job_id = job.job_id;
        tokio::spawn(async move {
            let outcome = match tokio::spawn(work(ctx)).await {
                Ok(outcome) => outcome,
                Err(err) => JobOutcome::failed(format!("job aborted: {}", err)),
            };
            registry.finish(owner, kind, job_id, outcome);
        });

        Ok(job)
    }

    /// Signal cancellation of the live job for `(owner, kind)`.
    ///
    /// A no-op when there is no live job. Returns whether a signal was sent.
    /// The job keeps running until its runner observes the signal.
    pub fn cancel(&self, owner: UserId, kind: JobKind) -> bool {
        let jobs = self.table();

        match jobs.get(&(owner, kind)) {
            Some(entry) if !entry.job.state.is_terminal() => {
                entry.cancel.cancel();
                info!(job_id = %entry.job.job_id, owner = %owner, kind = %kind, "Job cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Latest snapshot for `(owner, kind)`, if a job ever ran for it.
    pub fn status(&self, owner: UserId, kind: JobKind) -> Option<Job> {
        self.table().get(&(owner, kind)).map(|entry| entry.job.clone())
    }

    /// The single terminal transition. Later calls for the same job are no-ops.
    fn finish(&self, owner: UserId, kind: JobKind, job_id: JobId, outcome: JobOutcome) -> bool {
        let mut jobs = self.table();

        let Some(entry) = jobs.get_mut(&(owner, kind)) else {
            return false;
        };
        if entry.job.job_id != job_id || entry.job.state.is_terminal() {
            return false;
        }

        entry.job.state = outcome.state();
        entry.job.finished_at = Some(OffsetDateTime::now_utc());
        if let JobOutcome::Failed(reason) = &outcome {
            entry.job.error = Some(reason.clone());
        }

        let job = &entry.job;
        match &outcome {
            JobOutcome::Failed(reason) => warn!(
                job_id = %job.job_id,
                owner = %owner,
                kind = %kind,
                done = job.progress.done,
                total = job.progress.total,
                error = %reason,
                "Job failed"
            ),
            _ => info!(
                job_id = %job.job_id,
                owner = %owner,
                kind = %kind,
                state = ?job.state,
                done = job.progress.done,
                total = job.progress.total,
                "Job finished"
            ),
        }

        true
    }

    fn update_progress(&self, owner: UserId, kind: JobKind, job_id: JobId, f: impl FnOnce(&mut Progress)) {
        let mut jobs = self.table();
        if let Some(entry) = jobs.get_mut(&(owner, kind)) {
            if entry.job.job_id == job_id && !entry.job.state.is_terminal() {
                f(&mut entry.job.progress);
            }
        }
    }
}

/// A running job's view of itself: its cancellation token and progress reporting.
pub struct JobContext {
    job_id: JobId,
    owner: UserId,
    kind: JobKind,
    cancel: CancellationToken,
    registry: JobRegistry,
}

impl JobContext {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// Whether cancellation has been requested. Runners poll this between items.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Record `n` more finished items.
    pub fn advance(&self, n: usize) {
        self.registry
            .update_progress(self.owner, self.kind, self.job_id, |p| p.done += n);
    }

    /// Replace the item total once it is known.
    pub fn set_total(&self, total: usize) {
        self.registry
            .update_progress(self.owner, self.kind, self.job_id, |p| p.total = total);
    }
}
