use serde::{Deserialize, Serialize};

use super::ConceptId;

/// The `standard_concept` flag of an OMOP concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StandardConcept {
    Standard,
    Classification,
    NonStandard,
}

impl StandardConcept {
    /// Parses the single-letter flag used by the vocabulary tables (`S`, `C` or empty).
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some("S") => Self::Standard,
            Some("C") => Self::Classification,
            _ => Self::NonStandard,
        }
    }

    pub fn as_flag(&self) -> Option<&'static str> {
        match self {
            Self::Standard => Some("S"),
            Self::Classification => Some("C"),
            Self::NonStandard => None,
        }
    }
}

/// An indexed vocabulary entry. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub concept_id: ConceptId,
    pub concept_name: String,
    pub concept_code: String,
    pub domain_id: String,
    pub vocabulary_id: String,
    pub concept_class_id: String,
    pub standard_concept: StandardConcept,
    pub invalid_reason: Option<String>,
}

impl Concept {
    pub fn is_valid(&self) -> bool {
        self.invalid_reason
            .as_deref()
            .map(|reason| reason.trim().is_empty())
            .unwrap_or(true)
    }

    pub fn is_standard(&self) -> bool {
        self.standard_concept == StandardConcept::Standard
    }
}
