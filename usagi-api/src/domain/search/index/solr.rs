//! Solr-backed index client.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ::solr::SolrClient;
use tracing::{debug, info};

use crate::domain::models::{Concept, ConceptId, Filter, SearchMode, StandardConcept};
use crate::domain::search::traits::{IndexClient, Result};
use crate::domain::search::types::{IndexHit, IndexQuery, IndexStatus};

const NAME_FIELD: &str = "concept_name";
const CODE_FIELD: &str = "concept_code";

/// Index client speaking to a Solr core holding one document per concept.
#[derive(Clone)]
pub struct SolrIndexClient {
    client: SolrClient,
    max_results: usize,
}

impl SolrIndexClient {
    pub fn new(client: SolrClient, max_results: usize) -> Self {
        Self {
            client,
            max_results,
        }
    }

    fn params(&self, query: &IndexQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("fl", "*,score".to_string()),
            ("rows", self.max_results.to_string()),
        ];

        match query.mode() {
            SearchMode::FreeText => {
                let terms: Vec<String> = query.text().split_whitespace().map(solr::escape).collect();
                params.push(("defType", "edismax".to_string()));
                params.push(("q", terms.join(" ")));
                params.push(("qf", format!("{}^2 {}", NAME_FIELD, CODE_FIELD)));
            }
            SearchMode::ExactCode => {
                let code = solr::escape(query.text());
                params.push((
                    "q",
                    format!("{f}:{c}^10 OR {f}:{c}*", f = CODE_FIELD, c = code),
                ));
            }
        }

        for fq in filter_queries(query.filter()) {
            params.push(("fq", fq));
        }

        params
    }
}

/// Push as much of the filter as possible to the index.
fn filter_queries(filter: &Filter) -> Vec<String> {
    let mut fqs: Vec<String> = [
        solr::any_of("domain_id", filter.domain_ids.iter().map(String::as_str)),
        solr::any_of("vocabulary_id", filter.vocabulary_ids.iter().map(String::as_str)),
        solr::any_of(
            "concept_class_id",
            filter.concept_class_ids.iter().map(String::as_str),
        ),
    ]
    .into_iter()
    .flatten()
    .collect();

    if filter.standard_concept_only {
        fqs.push("standard_concept:S".to_string());
    }
    if !filter.include_invalid {
        fqs.push("-invalid_reason:[* TO *]".to_string());
    }

    fqs
}

/// Which indexed fields contributed to a hit, judged on the returned document.
fn matched_fields(query: &IndexQuery, concept: &Concept) -> BTreeSet<String> {
    let mut fields = BTreeSet::new();

    match query.mode() {
        SearchMode::ExactCode => {
            fields.insert(CODE_FIELD.to_string());
        }
        SearchMode::FreeText => {
            let name = concept.concept_name.to_lowercase();
            let code = concept.concept_code.to_lowercase();
            for term in query.text().split_whitespace().map(str::to_lowercase) {
                if name.contains(&term) {
                    fields.insert(NAME_FIELD.to_string());
                }
                if code.contains(&term) {
                    fields.insert(CODE_FIELD.to_string());
                }
            }
        }
    }

    fields
}

/// Keep only the best exact code hit; near-matches keep their index order.
///
/// Codes compare ASCII case-insensitively, as they do for ATC hints.
fn dedupe_exact(code: &str, hits: Vec<IndexHit>) -> Vec<IndexHit> {
    let mut seen_exact = false;
    hits.into_iter()
        .filter(|hit| {
            if !hit.concept.concept_code.eq_ignore_ascii_case(code) {
                return true;
            }
            !std::mem::replace(&mut seen_exact, true)
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
struct ConceptDoc {
    id: String,
    concept_id: i64,
    concept_name: String,
    concept_code: String,
    domain_id: String,
    vocabulary_id: String,
    concept_class_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    standard_concept: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_reason: Option<String>,
    #[serde(default, skip_serializing)]
    score: f64,
}

impl From<&Concept> for ConceptDoc {
    fn from(concept: &Concept) -> Self {
        Self {
            id: concept.concept_id.to_string(),
            concept_id: concept.concept_id.as_i64(),
            concept_name: concept.concept_name.clone(),
            concept_code: concept.concept_code.clone(),
            domain_id: concept.domain_id.clone(),
            vocabulary_id: concept.vocabulary_id.clone(),
            concept_class_id: concept.concept_class_id.clone(),
            standard_concept: concept.standard_concept.as_flag().map(str::to_owned),
            invalid_reason: concept.invalid_reason.clone(),
            score: 0.0,
        }
    }
}

impl From<ConceptDoc> for Concept {
    fn from(doc: ConceptDoc) -> Self {
        Self {
            concept_id: ConceptId::new(doc.concept_id),
            concept_name: doc.concept_name,
            concept_code: doc.concept_code,
            domain_id: doc.domain_id,
            vocabulary_id: doc.vocabulary_id,
            concept_class_id: doc.concept_class_id,
            standard_concept: StandardConcept::from_flag(doc.standard_concept.as_deref()),
            invalid_reason: doc.invalid_reason,
        }
    }
}

#[async_trait]
impl IndexClient for SolrIndexClient {
    async fn search(&self, query: &IndexQuery) -> Result<Vec<IndexHit>> {
        let response = self
            .client
            .select::<ConceptDoc>(&self.params(query))
            .await?;

        debug!(
            found = response.response.num_found,
            returned = response.response.docs.len(),
            "Index query answered"
        );

        let hits = response
            .response
            .docs
            .into_iter()
            .map(|doc| {
                let relevance = doc.score;
                let concept = Concept::from(doc);
                IndexHit {
                    matched_fields: matched_fields(query, &concept),
                    concept,
                    relevance,
                }
            })
            .collect();

        Ok(match query.mode() {
            SearchMode::ExactCode => dedupe_exact(query.text(), hits),
            SearchMode::FreeText => hits,
        })
    }

    async fn bulk_load(&self, vocabulary_id: &str, concepts: &[Concept]) -> Result<usize> {
        let docs: Vec<ConceptDoc> = concepts.iter().map(ConceptDoc::from).collect();
        self.client.update(&docs, true).await?;

        info!(vocabulary_id, documents = docs.len(), "Loaded concepts into index");
        Ok(docs.len())
    }

    async fn status(&self) -> Result<IndexStatus> {
        let documents = self.client.num_docs().await?;
        Ok(IndexStatus {
            core: self.client.core().to_string(),
            documents,
        })
    }
}
