//! Mock index client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Semaphore;

use crate::domain::models::Concept;
use crate::domain::search::traits::{IndexClient, Result, SearchError};
use crate::domain::search::types::{IndexHit, IndexQuery, IndexStatus};

/// Mock index client with scripted hits and failures.
///
/// # Examples
///
/// ```ignore
/// let index = MockIndexClient::new()
///     .with_hits(vec![hit1, hit2])
///     .with_hits_for("J45.0", vec![exact])
///     .unavailable_for("glucose");
/// ```
#[derive(Clone, Default)]
pub struct MockIndexClient {
    default_hits: Arc<RwLock<Vec<IndexHit>>>,
    hits_by_text: Arc<RwLock<HashMap<String, Vec<IndexHit>>>>,
    failing_texts: Arc<RwLock<HashMap<String, SearchError>>>,
    always_unavailable: Arc<RwLock<bool>>,
    /// 1-based bulk load calls that fail with `IndexUnavailable`.
    failing_loads: Arc<RwLock<Vec<usize>>>,
    loaded: Arc<RwLock<Vec<(String, Vec<Concept>)>>>,
    queries: Arc<RwLock<Vec<String>>>,
    search_calls: Arc<AtomicUsize>,
    load_calls: Arc<AtomicUsize>,
    gate: Option<Arc<Semaphore>>,
    waiting: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl MockIndexClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hits returned for any query without a more specific script.
    pub fn with_hits(self, hits: Vec<IndexHit>) -> Self {
        *self.default_hits.write().unwrap() = hits;
        self
    }

    /// Hits returned when the query text equals `text`.
    pub fn with_hits_for(self, text: &str, hits: Vec<IndexHit>) -> Self {
        self.hits_by_text
            .write()
            .unwrap()
            .insert(text.to_string(), hits);
        self
    }

    /// Fail searches for `text` with `IndexUnavailable`.
    pub fn unavailable_for(self, text: &str) -> Self {
        self.failing_with(text, SearchError::IndexUnavailable("connection refused".into()))
    }

    /// Fail searches for `text` with the given error.
    pub fn failing_with(self, text: &str, error: SearchError) -> Self {
        self.failing_texts
            .write()
            .unwrap()
            .insert(text.to_string(), error);
        self
    }

    /// Fail every call with `IndexUnavailable`.
    pub fn unavailable(self) -> Self {
        *self.always_unavailable.write().unwrap() = true;
        self
    }

    /// Fail the `call`-th bulk load (1-based) with `IndexUnavailable`.
    pub fn failing_load(self, call: usize) -> Self {
        self.failing_loads.write().unwrap().push(call);
        self
    }

    /// Block every search and bulk load until a permit is released.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `n` gated calls through.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Number of calls currently blocked on the gate.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn load_count(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Query texts in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.read().unwrap().clone()
    }

    /// Every bulk load accepted so far, in call order.
    pub fn loaded(&self) -> Vec<(String, Vec<Concept>)> {
        self.loaded.read().unwrap().clone()
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            gate.acquire()
                .await
                .expect("gate semaphore closed")
                .forget();
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn check_available(&self) -> Result<()> {
        if *self.always_unavailable.read().unwrap() {
            return Err(SearchError::IndexUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl IndexClient for MockIndexClient {
    async fn search(&self, query: &IndexQuery) -> Result<Vec<IndexHit>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.write().unwrap().push(query.text().to_string());
        self.pass_gate().await;
        self.check_available()?;

        if let Some(error) = self.failing_texts.read().unwrap().get(query.text()) {
            return Err(error.clone());
        }

        let hits = self
            .hits_by_text
            .read()
            .unwrap()
            .get(query.text())
            .cloned()
            .unwrap_or_else(|| self.default_hits.read().unwrap().clone());

        Ok(hits)
    }

    async fn bulk_load(&self, vocabulary_id: &str, concepts: &[Concept]) -> Result<usize> {
        let call = self.load_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.pass_gate().await;
        self.check_available()?;

        if self.failing_loads.read().unwrap().contains(&call) {
            return Err(SearchError::IndexUnavailable("connection reset".into()));
        }

        self.loaded
            .write()
            .unwrap()
            .push((vocabulary_id.to_string(), concepts.to_vec()));
        Ok(concepts.len())
    }

    async fn status(&self) -> Result<IndexStatus> {
        self.check_available()?;
        let documents = self
            .loaded
            .read()
            .unwrap()
            .iter()
            .map(|(_, concepts)| concepts.len() as u64)
            .sum();
        Ok(IndexStatus {
            core: "mock".to_string(),
            documents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Filter;

    #[tokio::test]
    async fn scripted_failures_apply_per_text() {
        let index = MockIndexClient::new().unavailable_for("glucose");

        let ok = IndexQuery::new(Filter::default(), "aspirin").unwrap();
        let failing = IndexQuery::new(Filter::default(), "glucose").unwrap();

        assert!(index.search(&ok).await.unwrap().is_empty());
        assert!(matches!(
            index.search(&failing).await,
            Err(SearchError::IndexUnavailable(_))
        ));
        assert_eq!(index.call_count(), 2);
    }

    #[tokio::test]
    async fn failing_load_only_hits_given_call() {
        let index = MockIndexClient::new().failing_load(2);

        assert!(index.bulk_load("RxNorm", &[]).await.is_ok());
        assert!(index.bulk_load("RxNorm", &[]).await.is_err());
        assert!(index.bulk_load("RxNorm", &[]).await.is_ok());
        assert_eq!(index.loaded().len(), 2);
    }
}
