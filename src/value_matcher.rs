//! Value Matcher
//!
//! Resolves an extracted literal against the values actually stored in its
//! column. Literals hallucinated or misspelled upstream ("John Handcock")
//! are reconciled to the nearest stored value ("John Hancock").

use crate::entity_extractor::ExtractedEntity;
use crate::execution::engine::{value_to_text, DataSource};
use crate::fuzzy_matcher::{process_and_sort, ratio};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Best scores must be strictly greater than this to be surfaced
pub const MIN_MATCH_SCORE: u8 = 45;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMatch {
    pub original_value: String,
    pub matched_value: String,
    /// 0-100 token-sort similarity
    pub score: u8,
}

impl ValueMatch {
    pub fn is_exact(&self) -> bool {
        self.score == 100
    }
}

/// Result of resolving one entity, including the non-match reasons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Matched(ValueMatch),
    /// Best candidate did not clear the threshold
    BelowThreshold { best_score: u8 },
    /// The column holds no non-null value
    NoCandidates,
    /// Table/column missing or the lookup query failed
    LookupFailed(String),
}

impl MatchOutcome {
    pub fn into_match(self) -> Option<ValueMatch> {
        match self {
            MatchOutcome::Matched(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValueMatcher {
    min_score: u8,
}

impl Default for ValueMatcher {
    fn default() -> Self {
        Self {
            min_score: MIN_MATCH_SCORE,
        }
    }
}

impl ValueMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some` only when the best stored value scores above the threshold.
    pub async fn match_entity(
        &self,
        entity: &ExtractedEntity,
        source: &dyn DataSource,
    ) -> Option<ValueMatch> {
        self.resolve(entity, source).await.into_match()
    }

    pub async fn resolve(&self, entity: &ExtractedEntity, source: &dyn DataSource) -> MatchOutcome {
        let candidates = match source.distinct_values(&entity.table, &entity.column).await {
            Ok(values) => values,
            Err(e) => {
                debug!(
                    "Lookup of {}.{} failed: {}",
                    entity.table, entity.column, e
                );
                return MatchOutcome::LookupFailed(e.to_string());
            }
        };

        let candidates: Vec<String> = candidates.iter().map(value_to_text).collect();
        let outcome = self.best_match(&entity.value, &candidates);
        match &outcome {
            MatchOutcome::Matched(m) => info!(
                "{}.{}: '{}' -> '{}' (score {})",
                entity.table, entity.column, m.original_value, m.matched_value, m.score
            ),
            other => debug!("{}.{}: no match ({:?})", entity.table, entity.column, other),
        }
        outcome
    }

    pub fn accepts(&self, score: u8) -> bool {
        score > self.min_score
    }

    /// Strictly highest score wins; ties keep the first candidate seen.
    pub fn best_match(&self, term: &str, candidates: &[String]) -> MatchOutcome {
        let term_sorted = process_and_sort(term);
        let mut best: Option<(&String, u8)> = None;

        for candidate in candidates {
            let score = ratio(&term_sorted, &process_and_sort(candidate));
            if score > best.map(|(_, s)| s).unwrap_or(0) {
                best = Some((candidate, score));
            }
        }

        match best {
            None if candidates.is_empty() => MatchOutcome::NoCandidates,
            None => MatchOutcome::BelowThreshold { best_score: 0 },
            Some((_, score)) if !self.accepts(score) => {
                MatchOutcome::BelowThreshold { best_score: score }
            }
            Some((value, score)) => MatchOutcome::Matched(ValueMatch {
                original_value: term.to_string(),
                matched_value: value.clone(),
                score,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_exact_value_scores_100() {
        let outcome = ValueMatcher::new().best_match("220", &strings(&["209", "217", "220"]));
        let m = outcome.into_match().unwrap();
        assert_eq!(m.matched_value, "220");
        assert_eq!(m.score, 100);
        assert!(m.is_exact());
    }

    #[test]
    fn test_misspelling_resolves_to_stored_value() {
        let m = ValueMatcher::new()
            .best_match("John Handcock", &strings(&["Jane Doe", "John Hancock"]))
            .into_match()
            .unwrap();
        assert_eq!(m.original_value, "John Handcock");
        assert_eq!(m.matched_value, "John Hancock");
        assert_eq!(m.score, 96);
    }

    #[test]
    fn test_ties_keep_first_seen() {
        // "Program A" and "A Program" normalize identically
        let m = ValueMatcher::new()
            .best_match("program a", &strings(&["Program A", "A Program"]))
            .into_match()
            .unwrap();
        assert_eq!(m.matched_value, "Program A");
    }

    #[test]
    fn test_threshold_is_strict() {
        let matcher = ValueMatcher::new();
        assert!(!matcher.accepts(45));
        assert!(matcher.accepts(46));

        // "abcd" vs "abxy" scores exactly 50
        let at = |min_score: u8| ValueMatcher { min_score }.best_match("abcd", &strings(&["abxy"]));
        assert_eq!(at(50), MatchOutcome::BelowThreshold { best_score: 50 });
        assert!(matches!(at(49), MatchOutcome::Matched(ref m) if m.score == 50));
    }

    #[test]
    fn test_no_candidates() {
        assert_eq!(
            ValueMatcher::new().best_match("x", &[]),
            MatchOutcome::NoCandidates
        );
        assert_eq!(
            ValueMatcher::new().best_match("abc", &strings(&["zzz"])),
            MatchOutcome::BelowThreshold { best_score: 0 }
        );
    }
}
