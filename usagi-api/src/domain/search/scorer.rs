//! Turns raw index hits into ranked [`ScoredMatch`]es.
//!
//! Everything here is pure: no I/O, no clock, no randomness. Given the same
//! hits and request context the output is always identical.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::types::IndexHit;
use crate::domain::models::{ConceptId, Filter, ScoredMatch};

/// Configuration for ranking.
#[derive(Debug, Clone, Copy)]
pub struct ScorerConfig {
    /// Added to the normalized score of concepts the source system already proposed.
    pub boost: f64,
    /// Maximum number of matches returned per query.
    pub max_results: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            boost: 0.05,
            max_results: 50,
        }
    }
}

/// Rank `hits` for one query.
///
/// 1. Drops hits the filter rejects (index-side filtering is best-effort).
/// 2. Normalizes relevance by the best hit of the set, clamped to `[0, 1]`.
/// 3. Boosts concepts listed in `auto_assigned`, capped at 1.0.
/// 4. Sorts by score descending, concept id ascending, and truncates.
pub fn score(
    hits: Vec<IndexHit>,
    filter: &Filter,
    auto_assigned: &[ConceptId],
    config: &ScorerConfig,
) -> Vec<ScoredMatch> {
    let hits: Vec<IndexHit> = hits
        .into_iter()
        .filter(|hit| filter.admits(&hit.concept))
        .collect();

    let max_relevance = hits
        .iter()
        .map(|hit| sanitize(hit.relevance))
        .fold(0.0_f64, f64::max);

    let boosted: HashSet<ConceptId> = auto_assigned.iter().copied().collect();
    let boost = sanitize(config.boost);

    let mut matches: Vec<ScoredMatch> = hits
        .into_iter()
        .map(|hit| {
            let mut score = normalize(sanitize(hit.relevance), max_relevance);
            if boosted.contains(&hit.concept.concept_id) {
                score = (score + boost).min(1.0);
            }

            ScoredMatch {
                concept: hit.concept,
                score,
                matched_fields: hit.matched_fields,
            }
        })
        .collect();

    matches.sort_by(rank_order);
    matches.truncate(config.max_results);
    matches
}

/// Score descending, then concept id ascending.
pub fn rank_order(a: &ScoredMatch, b: &ScoredMatch) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.concept_id().cmp(&b.concept_id()))
}

fn normalize(relevance: f64, max_relevance: f64) -> f64 {
    if max_relevance <= 0.0 {
        return 0.0;
    }
    (relevance / max_relevance).clamp(0.0, 1.0)
}

/// Negative and non-finite values carry no ranking information.
fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::models::{Concept, StandardConcept};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn hit(id: i64, relevance: f64) -> IndexHit {
        IndexHit {
            concept: Concept {
                concept_id: ConceptId::new(id),
                concept_name: format!("Concept {}", id),
                concept_code: format!("C{}", id),
                domain_id: "Drug".to_string(),
                vocabulary_id: "RxNorm".to_string(),
                concept_class_id: "Ingredient".to_string(),
                standard_concept: StandardConcept::Standard,
                invalid_reason: None,
            },
            relevance,
            matched_fields: BTreeSet::new(),
        }
    }

    /// Ids collide on purpose so duplicates and ties show up.
    fn arb_hit() -> impl Strategy<Value = IndexHit> {
        (0i64..25, prop_oneof![Just(0.0), Just(1.0), 0.0f64..5.0])
            .prop_map(|(id, relevance)| hit(id, relevance))
    }

    fn arb_config() -> impl Strategy<Value = ScorerConfig> {
        (0.0f64..2.0, 1usize..50).prop_map(|(boost, max_results)| ScorerConfig {
            boost,
            max_results,
        })
    }

    proptest! {
        #[test]
        fn output_is_ranked_bounded_and_truncated(
            hits in prop::collection::vec(arb_hit(), 0..40),
            boosted in prop::collection::vec((0i64..25).prop_map(ConceptId::new), 0..4),
            config in arb_config(),
        ) {
            let matches = score(hits, &Filter::default(), &boosted, &config);

            prop_assert!(matches.len() <= config.max_results);
            prop_assert!(matches.iter().all(|m| (0.0..=1.0).contains(&m.score)));
            for pair in matches.windows(2) {
                prop_assert_ne!(rank_order(&pair[0], &pair[1]), Ordering::Greater);
            }
        }

        #[test]
        fn equal_nonzero_relevance_always_scores_one(
            ids in prop::collection::btree_set(0i64..1000, 1..30),
            relevance in 0.001f64..1000.0,
        ) {
            let hits: Vec<IndexHit> = ids.iter().map(|&id| hit(id, relevance)).collect();
            let config = ScorerConfig {
                boost: 0.0,
                max_results: hits.len(),
            };

            let matches = score(hits, &Filter::default(), &[], &config);

            prop_assert!(matches.iter().all(|m| m.score == 1.0));
            let ranked: Vec<i64> = matches.iter().map(|m| m.concept_id().as_i64()).collect();
            prop_assert_eq!(ranked, ids.into_iter().collect::<Vec<_>>());
        }
    }
}
