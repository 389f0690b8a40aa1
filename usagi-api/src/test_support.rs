//! Polling helpers shared by the async job tests.

use std::time::Duration;

use crate::domain::jobs::{Job, JobKind, JobRegistry};
use crate::domain::models::UserId;

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll `condition` until it holds, panicking after a few seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(POLL_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Wait for the job at `(owner, kind)` to reach a terminal state and return it.
pub async fn wait_for_terminal(registry: &JobRegistry, owner: UserId, kind: JobKind) -> Job {
    wait_until(|| {
        registry
            .status(owner, kind)
            .is_some_and(|job| job.state.is_terminal())
    })
    .await;

    registry
        .status(owner, kind)
        .expect("job disappeared from registry")
}
