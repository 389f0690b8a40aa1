use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConceptId;

/// A local code-name pair submitted for mapping. Immutable once a job starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCode {
    pub id: i64,
    pub source_code: String,
    pub source_name: String,
    #[serde(default)]
    pub source_frequency: i64,
    #[serde(default)]
    pub additional_info: BTreeMap<String, String>,
}

/// What the concept-hint column of an import contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HintColumnType {
    #[default]
    ConceptIds,
    Atc,
}

/// Which input column supplied which role during import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRoles {
    pub source_code: String,
    pub source_name: String,
    #[serde(default)]
    pub source_frequency: Option<String>,
    /// Column (a key of `additional_info`) holding concept hints.
    #[serde(default)]
    pub auto_concept_id: Option<String>,
    #[serde(default)]
    pub column_type: HintColumnType,
    #[serde(default)]
    pub additional_info: Vec<String>,
}

impl SourceCode {
    /// Raw hint values from the concept-hint column, split on `;` or `,`.
    pub fn hint_values(&self, roles: &ColumnRoles) -> Vec<String> {
        let Some(column) = roles.auto_concept_id.as_deref() else {
            return vec![];
        };

        self.additional_info
            .get(column)
            .map(|raw| {
                raw.split([';', ','])
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Concept ids proposed by the source system. Only meaningful when the hint column
    /// contains concept ids; unparsable values are skipped.
    pub fn hinted_concept_ids(&self, roles: &ColumnRoles) -> Vec<ConceptId> {
        if roles.column_type != HintColumnType::ConceptIds {
            return vec![];
        }

        self.hint_values(roles)
            .iter()
            .filter_map(|v| v.parse().ok())
            .collect()
    }
}
