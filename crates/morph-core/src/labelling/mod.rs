//! Second-stage labelling of segmented words.
//!
//! Takes the segments produced by the segmenter and assigns each one a
//! morpheme label from its shape and its neighbours.

pub mod crf;
pub mod features;
pub mod search;

use std::collections::BTreeMap;
use std::io;

use tracing::{debug, debug_span};

pub use crf::{CrfParams, CrfTagger};
pub use features::SegmentFeaturizer;
pub use search::{RandomSearch, SearchResult};

use crate::settings::LabellerSettings;

#[derive(Debug, thiserror::Error)]
pub enum LabellingError {
    #[error("the model has not been trained")]
    NotTrained,

    #[error("there are {sequences} sequences but {labels} label sequences")]
    CountMismatch { sequences: usize, labels: usize },

    #[error("sequence {index} has {segments} segments but {labels} labels")]
    LengthMismatch {
        index: usize,
        segments: usize,
        labels: usize,
    },

    #[error("no training instances provided")]
    NoInstances,

    #[error("CRF error: {0}")]
    Crf(#[from] io::Error),
}

/// A trainable sequence model over per-item feature strings.
pub trait SequenceModel: Sized {
    fn fit(
        sequences: &[Vec<Vec<String>>],
        labels: &[Vec<String>],
        params: &CrfParams,
    ) -> Result<Self, LabellingError>;

    /// One label per item of `sequence`.
    fn predict(&self, sequence: &[Vec<String>]) -> Result<Vec<String>, LabellingError>;
}

pub(crate) fn check_training_shapes<T>(
    sequences: &[Vec<T>],
    labels: &[Vec<String>],
) -> Result<(), LabellingError> {
    if sequences.len() != labels.len() {
        return Err(LabellingError::CountMismatch {
            sequences: sequences.len(),
            labels: labels.len(),
        });
    }
    if sequences.is_empty() {
        return Err(LabellingError::NoInstances);
    }
    for (index, (seq, labels)) in sequences.iter().zip(labels).enumerate() {
        if seq.len() != labels.len() {
            return Err(LabellingError::LengthMismatch {
                index,
                segments: seq.len(),
                labels: labels.len(),
            });
        }
    }
    Ok(())
}

/// Labels segment sequences with a trained [`SequenceModel`].
///
/// Training fits `params` directly, or first runs a [`RandomSearch`] and
/// fits the winning parameters on all of the data.
#[derive(Debug, Clone)]
pub struct SequenceLabeller<M = CrfTagger> {
    featurizer: SegmentFeaturizer,
    params: CrfParams,
    search: Option<RandomSearch>,
    search_result: Option<SearchResult>,
    model: Option<M>,
}

impl<M: SequenceModel> Default for SequenceLabeller<M> {
    fn default() -> Self {
        Self::new(SegmentFeaturizer::default(), CrfParams::default())
    }
}

impl<M: SequenceModel> SequenceLabeller<M> {
    pub fn new(featurizer: SegmentFeaturizer, params: CrfParams) -> Self {
        Self {
            featurizer,
            params,
            search: None,
            search_result: None,
            model: None,
        }
    }

    pub fn with_search(mut self, search: RandomSearch) -> Self {
        self.search = Some(search);
        self
    }

    pub fn from_settings(settings: &LabellerSettings) -> Self {
        let params = CrfParams {
            c1: settings.c1,
            c2: settings.c2,
            max_iterations: settings.max_iterations,
        };
        let labeller = Self::new(SegmentFeaturizer::new(settings.ngrams), params);
        if settings.search.iterations > 0 {
            labeller.with_search(RandomSearch::from_settings(&settings.search))
        } else {
            labeller
        }
    }

    /// Trains a labeller on `params` without searching.
    pub fn build<S: AsRef<str>>(
        featurizer: SegmentFeaturizer,
        params: CrfParams,
        sequences: &[Vec<S>],
        labels: &[Vec<String>],
    ) -> Result<Self, LabellingError> {
        let mut labeller = Self::new(featurizer, params);
        labeller.train(sequences, labels)?;
        Ok(labeller)
    }

    pub fn featurizer(&self) -> &SegmentFeaturizer {
        &self.featurizer
    }

    /// The parameters of the last fit, which the search may have replaced.
    pub fn params(&self) -> &CrfParams {
        &self.params
    }

    pub fn search_result(&self) -> Option<&SearchResult> {
        self.search_result.as_ref()
    }

    pub fn model(&self) -> Option<&M> {
        self.model.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn train<S: AsRef<str>>(
        &mut self,
        sequences: &[Vec<S>],
        labels: &[Vec<String>],
    ) -> Result<(), LabellingError> {
        check_training_shapes(sequences, labels)?;
        let _span = debug_span!("labeller_train", sequences = sequences.len()).entered();
        let features = self.featurizer.convert_many(sequences);

        if let Some(search) = &self.search {
            if let Some(result) = search.run::<M>(&self.params, &features, labels)? {
                debug!(
                    c1 = result.params.c1,
                    c2 = result.params.c2,
                    score = result.score,
                    "search chose parameters"
                );
                self.params = result.params;
                self.search_result = Some(result);
            }
        }
        self.model = Some(M::fit(&features, labels, &self.params)?);
        Ok(())
    }

    pub fn label<S: AsRef<str>>(&self, sequence: &[S]) -> Result<Vec<String>, LabellingError> {
        let model = self.model.as_ref().ok_or(LabellingError::NotTrained)?;
        model.predict(&self.featurizer.convert(sequence))
    }

    pub fn label_many<S: AsRef<str>>(
        &self,
        sequences: &[Vec<S>],
    ) -> Result<Vec<Vec<String>>, LabellingError> {
        sequences.iter().map(|seq| self.label(seq)).collect()
    }

    /// Support-weighted F1 of the predicted labels over every position.
    pub fn evaluate<S: AsRef<str>>(
        &self,
        sequences: &[Vec<S>],
        labels: &[Vec<String>],
    ) -> Result<f64, LabellingError> {
        check_training_shapes(sequences, labels)?;
        let predicted = self.label_many(sequences)?;
        Ok(flat_f1_score(labels, &predicted))
    }
}

#[derive(Default)]
struct LabelCounts {
    true_positive: usize,
    predicted: usize,
    support: usize,
}

/// F1 over flattened label sequences, averaged per label weighted by the
/// number of gold occurrences. Labels that are never correct score 0.
pub fn flat_f1_score(gold: &[Vec<String>], predicted: &[Vec<String>]) -> f64 {
    let mut counts: BTreeMap<&str, LabelCounts> = BTreeMap::new();
    let pairs = gold.iter().flatten().zip(predicted.iter().flatten());
    for (expected, actual) in pairs {
        counts.entry(expected).or_default().support += 1;
        counts.entry(actual).or_default().predicted += 1;
        if expected == actual {
            counts.entry(expected).or_default().true_positive += 1;
        }
    }

    let total: usize = counts.values().map(|c| c.support).sum();
    if total == 0 {
        return 0.0;
    }
    let weighted: f64 = counts
        .values()
        .filter(|c| c.true_positive > 0)
        .map(|c| {
            let tp = c.true_positive as f64;
            let f1 = 2.0 * tp / (c.predicted + c.support) as f64;
            f1 * c.support as f64
        })
        .sum();
    weighted / total as f64
}
