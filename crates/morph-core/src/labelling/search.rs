//! Seeded random search over CRF regularization.
//!
//! Candidates draw `c1` and `c2` from exponential distributions and are
//! scored by k-fold cross validation with [`flat_f1_score`]. The first
//! candidate with the best mean score wins.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, debug_span, warn};

use super::crf::CrfParams;
use super::{flat_f1_score, LabellingError, SequenceModel};
use crate::settings::LabellerSearchSettings;

pub const DEFAULT_ITERATIONS: usize = 50;
pub const DEFAULT_FOLDS: usize = 3;
pub const DEFAULT_C1_SCALE: f64 = 0.5;
pub const DEFAULT_C2_SCALE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct RandomSearch {
    pub iterations: usize,
    pub folds: usize,
    pub c1_scale: f64,
    pub c2_scale: f64,
    pub seed: u64,
}

impl Default for RandomSearch {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            folds: DEFAULT_FOLDS,
            c1_scale: DEFAULT_C1_SCALE,
            c2_scale: DEFAULT_C2_SCALE,
            seed: 0,
        }
    }
}

/// The winning parameters and their mean cross-validated F1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchResult {
    pub params: CrfParams,
    pub score: f64,
}

/// Inverse CDF of the exponential distribution with the given scale.
fn exponential(rng: &mut StdRng, scale: f64) -> f64 {
    let u: f64 = rng.random();
    -scale * (1.0 - u).ln()
}

/// Contiguous, unshuffled folds; the first `len % folds` get one extra item.
pub(crate) fn fold_ranges(len: usize, folds: usize) -> Vec<Range<usize>> {
    let base = len / folds;
    let extra = len % folds;
    let mut start = 0;
    (0..folds)
        .map(|fold| {
            let size = base + usize::from(fold < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

fn cross_validate<M: SequenceModel>(
    params: &CrfParams,
    sequences: &[Vec<Vec<String>>],
    labels: &[Vec<String>],
    folds: &[Range<usize>],
) -> Result<f64, LabellingError> {
    let mut total = 0.0;
    for fold in folds {
        let outside = |i: &usize| !fold.contains(i);
        let train_x: Vec<_> = (0..sequences.len())
            .filter(outside)
            .map(|i| sequences[i].clone())
            .collect();
        let train_y: Vec<_> = (0..labels.len())
            .filter(outside)
            .map(|i| labels[i].clone())
            .collect();

        let model = M::fit(&train_x, &train_y, params)?;
        let predicted = sequences[fold.clone()]
            .iter()
            .map(|seq| model.predict(seq))
            .collect::<Result<Vec<_>, _>>()?;
        total += flat_f1_score(&labels[fold.clone()], &predicted);
    }
    Ok(total / folds.len() as f64)
}

impl RandomSearch {
    pub fn from_settings(settings: &LabellerSearchSettings) -> Self {
        Self {
            iterations: settings.iterations,
            folds: settings.folds,
            c1_scale: settings.c1_scale,
            c2_scale: settings.c2_scale,
            seed: settings.seed,
        }
    }

    /// The parameters tried, in order. `max_iterations` comes from `base`.
    pub fn candidates(&self, base: &CrfParams) -> Vec<CrfParams> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.iterations)
            .map(|_| CrfParams {
                c1: exponential(&mut rng, self.c1_scale),
                c2: exponential(&mut rng, self.c2_scale),
                max_iterations: base.max_iterations,
            })
            .collect()
    }

    /// Returns `None` when there are too few sequences to hold any out.
    /// Candidates whose model fails to train are skipped.
    pub fn run<M: SequenceModel>(
        &self,
        base: &CrfParams,
        sequences: &[Vec<Vec<String>>],
        labels: &[Vec<String>],
    ) -> Result<Option<SearchResult>, LabellingError> {
        let folds = self.folds.min(sequences.len());
        if folds < 2 || self.iterations == 0 {
            warn!(
                sequences = sequences.len(),
                folds = self.folds,
                "skipping parameter search"
            );
            return Ok(None);
        }
        let _span = debug_span!("random_search", iterations = self.iterations, folds).entered();

        let folds = fold_ranges(sequences.len(), folds);
        let mut best: Option<SearchResult> = None;
        let mut last_error = None;
        for params in self.candidates(base) {
            let score = match cross_validate::<M>(&params, sequences, labels, &folds) {
                Ok(score) => score,
                Err(LabellingError::Crf(e)) => {
                    warn!(c1 = params.c1, c2 = params.c2, error = %e, "candidate failed");
                    last_error = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            debug!(c1 = params.c1, c2 = params.c2, score, "candidate scored");
            if best.map_or(true, |b| score > b.score) {
                best = Some(SearchResult { params, score });
            }
        }
        match (best, last_error) {
            (None, Some(e)) => Err(LabellingError::Crf(e)),
            (best, _) => Ok(best),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Memorizes the label of each `shape=` feature, and forgets everything
    /// once `c1` passes 0.5.
    struct MemoryModel {
        table: HashMap<String, String>,
    }

    impl SequenceModel for MemoryModel {
        fn fit(
            sequences: &[Vec<Vec<String>>],
            labels: &[Vec<String>],
            params: &CrfParams,
        ) -> Result<Self, LabellingError> {
            let mut table = HashMap::new();
            if params.c1 <= 0.5 {
                for (item, label) in sequences.iter().flatten().zip(labels.iter().flatten()) {
                    table.insert(item[0].clone(), label.clone());
                }
            }
            Ok(Self { table })
        }

        fn predict(&self, sequence: &[Vec<String>]) -> Result<Vec<String>, LabellingError> {
            Ok(sequence
                .iter()
                .map(|item| self.table.get(&item[0]).cloned().unwrap_or_else(|| "?".into()))
                .collect())
        }
    }

    /// Fails to train whenever `c1` passes 0.5.
    struct FragileModel;

    impl SequenceModel for FragileModel {
        fn fit(
            _sequences: &[Vec<Vec<String>>],
            _labels: &[Vec<String>],
            params: &CrfParams,
        ) -> Result<Self, LabellingError> {
            if params.c1 > 0.5 {
                return Err(std::io::Error::other("line search failed").into());
            }
            Ok(Self)
        }

        fn predict(&self, sequence: &[Vec<String>]) -> Result<Vec<String>, LabellingError> {
            Ok(sequence.iter().map(|_| "A".to_string()).collect())
        }
    }

    fn corpus() -> (Vec<Vec<Vec<String>>>, Vec<Vec<String>>) {
        let words = [["a", "b"], ["a", "b"], ["b", "a"], ["b", "a"], ["a", "a"], ["b", "b"]];
        let sequences = words
            .iter()
            .map(|w| w.iter().map(|s| vec![format!("shape={s}")]).collect())
            .collect();
        let labels = words
            .iter()
            .map(|w| w.iter().map(|s| s.to_uppercase()).collect())
            .collect();
        (sequences, labels)
    }

    fn search(iterations: usize, seed: u64) -> RandomSearch {
        RandomSearch {
            iterations,
            seed,
            ..RandomSearch::default()
        }
    }

    #[test]
    fn folds_cover_everything_once() {
        assert_eq!(fold_ranges(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(fold_ranges(6, 3), vec![0..2, 2..4, 4..6]);
        assert_eq!(fold_ranges(2, 2), vec![0..1, 1..2]);
    }

    #[test]
    fn candidates_reproducible_per_seed() {
        let base = CrfParams::default();
        let first = search(5, 7).candidates(&base);
        assert_eq!(first, search(5, 7).candidates(&base));
        assert_ne!(first, search(5, 8).candidates(&base));
        assert!(first
            .iter()
            .all(|p| p.c1 >= 0.0 && p.c2 >= 0.0 && p.max_iterations == base.max_iterations));
    }

    #[test]
    fn picks_first_best_candidate() {
        let (sequences, labels) = corpus();
        let search = search(20, 3);
        let base = CrfParams::default();
        let result = search
            .run::<MemoryModel>(&base, &sequences, &labels)
            .unwrap()
            .unwrap();

        let expected = search
            .candidates(&base)
            .into_iter()
            .find(|p| p.c1 <= 0.5)
            .unwrap();
        assert_eq!(result.params, expected);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn failed_candidates_skipped() {
        let (sequences, labels) = corpus();
        let search = search(20, 3);
        let base = CrfParams::default();
        let result = search
            .run::<FragileModel>(&base, &sequences, &labels)
            .unwrap()
            .unwrap();
        assert!(result.params.c1 <= 0.5);
    }

    #[test]
    fn all_candidates_failing_is_an_error() {
        let (sequences, labels) = corpus();
        let search = RandomSearch {
            c1_scale: 1e6,
            ..search(2, 0)
        };
        let err = search
            .run::<FragileModel>(&CrfParams::default(), &sequences, &labels)
            .unwrap_err();
        assert!(matches!(err, LabellingError::Crf(_)));
    }

    #[test]
    fn too_few_sequences_skip_search() {
        let (sequences, labels) = corpus();
        let result = search(5, 0)
            .run::<MemoryModel>(&CrfParams::default(), &sequences[..1], &labels[..1])
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn folds_clamped_to_sequence_count() {
        let (sequences, labels) = corpus();
        let search = RandomSearch {
            folds: 10,
            ..search(3, 1)
        };
        let result = search
            .run::<MemoryModel>(&CrfParams::default(), &sequences[..2], &labels[..2])
            .unwrap();
        assert!(result.is_some());
    }
}
