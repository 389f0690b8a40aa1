//! Core types for the search domain.

use std::collections::BTreeSet;

use serde::Serialize;

use super::traits::{Result, SearchError};
use crate::domain::models::{Concept, Filter, SearchMode};

/// A validated query ready to be sent to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    text: String,
    filter: Filter,
}

impl IndexQuery {
    /// Validate `text` against the filter's search mode.
    ///
    /// Free text must contain something other than whitespace; exact-code
    /// queries must look like a code.
    pub fn new(filter: Filter, text: &str) -> Result<Self> {
        let text = text.trim();

        match filter.search_mode {
            SearchMode::FreeText if text.is_empty() => {
                return Err(SearchError::InvalidQuery(
                    "search term must not be empty".to_string(),
                ));
            }
            SearchMode::ExactCode if !is_code_pattern(text) => {
                return Err(SearchError::InvalidQuery(format!(
                    "'{}' is not a valid code",
                    text
                )));
            }
            _ => {}
        }

        Ok(Self {
            text: text.to_string(),
            filter,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn mode(&self) -> SearchMode {
        self.filter.search_mode
    }
}

/// Codes are non-empty runs of ASCII alphanumerics and `. - _ / :`.
pub fn is_code_pattern(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/' | ':'))
}

/// A raw hit as returned by the index, before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub concept: Concept,
    /// Index-specific relevance; only meaningful relative to other hits of the same query.
    pub relevance: f64,
    pub matched_fields: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub core: String,
    pub documents: u64,
}
