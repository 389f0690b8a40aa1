use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{ColumnRoles, Concept, ConceptId, Filter, SourceCode};

/// One ranked search candidate. Scores are comparable only within one result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredMatch {
    #[serde(flatten)]
    pub concept: Concept,
    pub score: f64,
    pub matched_fields: BTreeSet<String>,
}

impl ScoredMatch {
    pub fn concept_id(&self) -> ConceptId {
        self.concept.concept_id
    }
}

/// Outcome of mapping one source code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingResult {
    pub source_code_id: i64,
    pub chosen_concept_id: Option<ConceptId>,
    pub candidates: Vec<ScoredMatch>,
    pub auto_assigned: bool,
    /// Set when the item could not be mapped; candidates are then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl MappingResult {
    pub fn failed(source_code_id: i64, reason: impl Into<String>) -> Self {
        Self {
            source_code_id,
            chosen_concept_id: None,
            candidates: vec![],
            auto_assigned: false,
            failure: Some(reason.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// The persisted state of an owner's latest mapping batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedMapping {
    pub source_codes: Vec<SourceCode>,
    pub results: Vec<MappingResult>,
}

/// A set of accepted mappings saved under a name for reuse and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedVocabulary {
    pub name: String,
    pub source_codes: Vec<SourceCode>,
    pub mappings: Vec<MappingResult>,
    #[serde(default)]
    pub filters: Filter,
    #[serde(default)]
    pub column_roles: ColumnRoles,
}
