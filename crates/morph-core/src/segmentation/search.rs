use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, debug_span};

use super::constraints::ConstraintSet;
use super::SegmentationError;
use crate::settings::SearchSettings;

/// Picks the best label sequence out of per-position option sets.
pub trait SearchStrategy: Send + Sync + fmt::Debug {
    fn search(
        &self,
        options: &[BTreeSet<String>],
        constraints: &ConstraintSet,
    ) -> Result<Vec<String>, SegmentationError>;
}

/// Number of label sequences `options` allows, or `None` on overflow.
pub fn candidate_count(options: &[BTreeSet<String>]) -> Option<usize> {
    options
        .iter()
        .try_fold(1usize, |count, option| count.checked_mul(option.len()))
}

/// Scores every sequence in the Cartesian product of the option sets and
/// keeps the first one with the highest score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExhaustiveSearch {
    max_candidates: Option<usize>,
}

impl ExhaustiveSearch {
    /// Unbounded search.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse inputs with more than `limit` candidate sequences.
    pub fn with_max_candidates(mut self, limit: usize) -> Self {
        self.max_candidates = Some(limit);
        self
    }

    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self {
            max_candidates: (settings.max_candidates > 0).then_some(settings.max_candidates),
        }
    }

    pub fn max_candidates(&self) -> Option<usize> {
        self.max_candidates
    }
}

impl SearchStrategy for ExhaustiveSearch {
    fn search(
        &self,
        options: &[BTreeSet<String>],
        constraints: &ConstraintSet,
    ) -> Result<Vec<String>, SegmentationError> {
        let count = candidate_count(options);
        let _span = debug_span!(
            "exhaustive_search",
            positions = options.len(),
            constraints = constraints.len(),
            candidates = ?count
        )
        .entered();

        if let Some(limit) = self.max_candidates {
            match count {
                Some(count) if count <= limit => {}
                _ => {
                    return Err(SegmentationError::SearchSpaceTooLarge {
                        candidates: count.unwrap_or(usize::MAX),
                        limit,
                    })
                }
            }
        }
        if options.iter().any(BTreeSet::is_empty) {
            return Err(SegmentationError::NoCandidates);
        }

        let choices: Vec<Vec<&str>> = options
            .iter()
            .map(|option| option.iter().map(String::as_str).collect())
            .collect();

        // Odometer over the option indices; the last position turns fastest.
        let mut digits = vec![0usize; choices.len()];
        let mut current: Vec<&str> = choices.iter().map(|c| c[0]).collect();
        let mut best = current.clone();
        let mut best_score = constraints.score(&current);

        'outer: loop {
            let mut pos = choices.len();
            loop {
                if pos == 0 {
                    break 'outer;
                }
                pos -= 1;
                digits[pos] += 1;
                if digits[pos] < choices[pos].len() {
                    current[pos] = choices[pos][digits[pos]];
                    break;
                }
                digits[pos] = 0;
                current[pos] = choices[pos][0];
            }

            let score = constraints.score(&current);
            if score > best_score {
                best_score = score;
                best.clone_from(&current);
            }
        }

        debug!(best_score, "search finished");
        Ok(best.into_iter().map(str::to_string).collect())
    }
}
