use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::Concept;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchMode {
    #[default]
    FreeText,
    ExactCode,
}

/// Search filters, constructed per request.
///
/// Empty id sets mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filter {
    pub search_mode: SearchMode,
    pub domain_ids: BTreeSet<String>,
    pub vocabulary_ids: BTreeSet<String>,
    pub concept_class_ids: BTreeSet<String>,
    pub standard_concept_only: bool,
    pub include_invalid: bool,
    pub search_string: Option<String>,
}

impl Filter {
    /// Whether `concept` passes every predicate of this filter.
    pub fn admits(&self, concept: &Concept) -> bool {
        if !self.domain_ids.is_empty() && !self.domain_ids.contains(&concept.domain_id) {
            return false;
        }
        if !self.vocabulary_ids.is_empty() && !self.vocabulary_ids.contains(&concept.vocabulary_id)
        {
            return false;
        }
        if !self.concept_class_ids.is_empty()
            && !self.concept_class_ids.contains(&concept.concept_class_id)
        {
            return false;
        }
        if self.standard_concept_only && !concept.is_standard() {
            return false;
        }
        if !self.include_invalid && !concept.is_valid() {
            return false;
        }
        true
    }
}

/// Distinct values available for each filter dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub domain_ids: Vec<String>,
    pub vocabulary_ids: Vec<String>,
    pub concept_class_ids: Vec<String>,
}
