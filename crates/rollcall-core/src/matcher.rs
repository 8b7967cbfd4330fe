//! Descriptor matching by Euclidean distance.

use crate::types::{FeatureVector, Person};
use serde::Serialize;

/// One enrolled vector offered to the matcher, tagged with its owner.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub person: Person,
    pub vector: FeatureVector,
}

/// Result of matching a query descriptor against a candidate set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MatchResult {
    /// Closest candidate, at a distance within the admission threshold.
    Match { person: Person, distance: f32 },
    /// No comparable candidate within the threshold. `closest` and `mean`
    /// cover the comparable candidates and are `None` when there were none.
    NoMatch {
        closest: Option<f32>,
        mean: Option<f32>,
    },
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Match { .. })
    }

    /// Distance of the match, or of the closest rejected candidate.
    pub fn distance(&self) -> Option<f32> {
        match self {
            MatchResult::Match { distance, .. } => Some(*distance),
            MatchResult::NoMatch { closest, .. } => *closest,
        }
    }
}

/// Strategy for comparing a query descriptor against enrolled candidates.
///
/// Callers scope `candidates` to one person for identity verification,
/// or pass every enrolled vector for open-set identification.
pub trait Matcher {
    fn compare(&self, query: &FeatureVector, candidates: &[Candidate], threshold: f32) -> MatchResult;
}

/// Minimum-distance matcher with an inclusive admission threshold.
///
/// Walks the whole candidate set. Candidates whose length differs from the
/// query are skipped with a warning. Ties keep the earliest candidate, so
/// the result depends only on the inputs and their order.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(&self, query: &FeatureVector, candidates: &[Candidate], threshold: f32) -> MatchResult {
        let mut best: Option<(usize, f32)> = None;
        let mut sum = 0.0f32;
        let mut compared = 0usize;

        for (i, candidate) in candidates.iter().enumerate() {
            let Some(distance) = query.euclidean_distance(&candidate.vector) else {
                tracing::warn!(
                    person_id = candidate.person.id,
                    expected = query.len(),
                    got = candidate.vector.len(),
                    "descriptor length mismatch; skipping candidate"
                );
                continue;
            };
            tracing::trace!(person_id = candidate.person.id, distance, "compared candidate");

            sum += distance;
            compared += 1;
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }

        match best {
            Some((idx, distance)) if distance <= threshold => MatchResult::Match {
                person: candidates[idx].person.clone(),
                distance,
            },
            _ => MatchResult::NoMatch {
                closest: best.map(|(_, d)| d),
                mean: (compared > 0).then(|| sum / compared as f32),
            },
        }
    }
}
