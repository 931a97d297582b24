use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::dataset::{FacilityRecord, FacilityRegistry};
use super::normalizer::{normalize_name, token_weight};

const MAX_SUGGESTIONS: usize = 5;
const SCORE_EPSILON: f64 = 1e-9;
const MAX_TYPO_EDITS: usize = 1;

/// Policy dials for approximate facility matching.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Minimum similarity (0-1) a fuzzy candidate needs to be accepted.
    pub acceptance_threshold: f64,
    /// Any other facility scoring within this margin of the best makes the match ambiguous.
    pub tie_margin: f64,
    /// Minimum similarity for a name to be offered as a suggestion after `NoMatch`.
    pub suggestion_threshold: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.85,
            tie_margin: 0.01,
            suggestion_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Normalized,
    Fuzzy,
}

/// A facility picked out of the registry for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedFacility<'a> {
    pub record: &'a FacilityRecord,
    pub match_score: f64,
    pub match_method: MatchMethod,
}

impl ResolvedFacility<'_> {
    /// Note surfaced to the caller when the name was only approximately matched.
    pub fn resolution_note(&self) -> Option<String> {
        match self.match_method {
            MatchMethod::Fuzzy => Some(format!(
                "Resolved to closest match: {}",
                self.record.canonical_name
            )),
            MatchMethod::Exact | MatchMethod::Normalized => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolutionError {
    #[error("{}", no_match_message(.query, .suggestions))]
    NoMatch {
        query: String,
        suggestions: Vec<String>,
    },
    #[error("facility '{query}' is ambiguous between: {}", .candidates.join(" | "))]
    AmbiguousMatch {
        query: String,
        candidates: Vec<String>,
    },
}

fn no_match_message(query: &str, suggestions: &[String]) -> String {
    if query.is_empty() {
        "no facility selected".to_string()
    } else if suggestions.is_empty() {
        format!("facility not found: '{query}'")
    } else {
        format!(
            "facility not found: '{query}'. Did you mean one of: {}?",
            suggestions.join(" | ")
        )
    }
}

/// Pure lookup over an immutable registry snapshot.
pub struct FacilityResolver<'a> {
    registry: &'a FacilityRegistry,
    config: ResolverConfig,
}

impl<'a> FacilityResolver<'a> {
    pub fn new(registry: &'a FacilityRegistry, config: ResolverConfig) -> Self {
        Self { registry, config }
    }

    pub fn resolve(&self, query: &str) -> Result<ResolvedFacility<'a>, ResolutionError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(ResolutionError::NoMatch {
                query: String::new(),
                suggestions: Vec::new(),
            });
        }

        let exact = self.facilities_where(|name| name.trim() == trimmed);
        if let Some(resolved) = self.single(trimmed, exact, MatchMethod::Exact)? {
            return Ok(resolved);
        }

        let normalized_query = normalize_name(trimmed);
        let normalized = self.facilities_where(|name| normalize_name(name) == normalized_query);
        if let Some(resolved) = self.single(trimmed, normalized, MatchMethod::Normalized)? {
            return Ok(resolved);
        }

        self.fuzzy(trimmed, &normalized_query)
    }

    fn facilities_where<F>(&self, predicate: F) -> Vec<&'a FacilityRecord>
    where
        F: Fn(&str) -> bool,
    {
        self.registry
            .facilities()
            .iter()
            .filter(|record| record.names().any(&predicate))
            .collect()
    }

    fn single(
        &self,
        query: &str,
        matches: Vec<&'a FacilityRecord>,
        method: MatchMethod,
    ) -> Result<Option<ResolvedFacility<'a>>, ResolutionError> {
        match matches.as_slice() {
            [] => Ok(None),
            [record] => Ok(Some(ResolvedFacility {
                record: *record,
                match_score: 1.0,
                match_method: method,
            })),
            many => Err(ResolutionError::AmbiguousMatch {
                query: query.to_string(),
                candidates: many
                    .iter()
                    .map(|record| record.canonical_name.clone())
                    .collect(),
            }),
        }
    }

    fn fuzzy(&self, query: &str, normalized_query: &str) -> Result<ResolvedFacility<'a>, ResolutionError> {
        let mut scored: Vec<Candidate<'a>> = self
            .registry
            .facilities()
            .iter()
            .map(|record| Candidate::score(record, normalized_query))
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));

        let accepted: Vec<&Candidate<'a>> = scored
            .iter()
            .filter(|candidate| self.accepts(candidate))
            .collect();
        let Some(leader) = accepted.first().copied() else {
            return Err(self.no_match(query, &scored));
        };

        // Equal edit distance is a tie whatever the name lengths do to the ratio.
        let contenders: Vec<&Candidate<'a>> = accepted
            .iter()
            .copied()
            .filter(|candidate| {
                leader.score - candidate.score <= self.config.tie_margin + SCORE_EPSILON
                    || candidate.distance <= leader.distance
            })
            .collect();
        if contenders.len() > 1 {
            return Err(ResolutionError::AmbiguousMatch {
                query: query.to_string(),
                candidates: contenders
                    .iter()
                    .map(|candidate| candidate.record.canonical_name.clone())
                    .collect(),
            });
        }

        Ok(ResolvedFacility {
            record: leader.record,
            match_score: leader.score.clamp(0.0, 1.0),
            match_method: MatchMethod::Fuzzy,
        })
    }

    /// Above the ratio threshold, or a single typo away from one of the names.
    fn accepts(&self, candidate: &Candidate<'_>) -> bool {
        candidate.score + SCORE_EPSILON >= self.config.acceptance_threshold
            || candidate.distance <= MAX_TYPO_EDITS
    }

    fn no_match(&self, query: &str, scored: &[Candidate<'_>]) -> ResolutionError {
        let suggestions = scored
            .iter()
            .filter(|candidate| candidate.score + SCORE_EPSILON >= self.config.suggestion_threshold)
            .take(MAX_SUGGESTIONS)
            .map(|candidate| candidate.record.canonical_name.clone())
            .collect();
        ResolutionError::NoMatch {
            query: query.to_string(),
            suggestions,
        }
    }
}

/// One facility scored against a normalized query, best over all of its names.
struct Candidate<'a> {
    record: &'a FacilityRecord,
    score: f64,
    distance: usize,
}

impl<'a> Candidate<'a> {
    fn score(record: &'a FacilityRecord, normalized_query: &str) -> Self {
        let names: Vec<String> = record.names().map(normalize_name).collect();
        let score = names
            .iter()
            .map(|name| similarity(normalized_query, name))
            .fold(0.0_f64, f64::max);
        let distance = names
            .iter()
            .map(|name| strsim::levenshtein(normalized_query, name))
            .min()
            .unwrap_or(usize::MAX);
        Self {
            record,
            score,
            distance,
        }
    }
}

/// Best of character-level and weighted token-level similarity, both in 0-1.
fn similarity(query: &str, candidate: &str) -> f64 {
    let edit = strsim::normalized_levenshtein(query, candidate);
    let tokens = weighted_token_dice(query, candidate);
    edit.max(tokens)
}

/// Dice coefficient over token sets where generic suffix words count for little.
fn weighted_token_dice(query: &str, candidate: &str) -> f64 {
    let weights = |value: &str| -> HashMap<String, f64> {
        value
            .split_whitespace()
            .map(|token| (token.to_string(), token_weight(token)))
            .collect()
    };
    let query_tokens = weights(query);
    let candidate_tokens = weights(candidate);

    let total: f64 = query_tokens.values().sum::<f64>() + candidate_tokens.values().sum::<f64>();
    if total <= 0.0 {
        return 0.0;
    }

    let shared: f64 = query_tokens
        .iter()
        .filter(|(token, _)| candidate_tokens.contains_key(*token))
        .map(|(_, weight)| weight)
        .sum();

    (2.0 * shared) / total
}
