use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use super::features::{Features, TrainingPair};

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("no training instances provided")]
    NoInstances,

    #[error("training failed: {0}")]
    Training(String),
}

/// A probabilistic per-position classifier over trigram labels.
pub trait ClassifierAdaptor: Sized {
    /// Fit a fresh classifier on `pairs`.
    fn train(pairs: &[TrainingPair]) -> Result<Self, ClassifierError>;

    /// Every known label with its probability for `features`.
    fn prob_classify(&self, features: &Features) -> Vec<(String, f64)>;
}

pub const DEFAULT_ALPHA: f64 = 1.0;

/// Multinomial naive Bayes over one-hot `name=value` features.
///
/// Features never seen in training are ignored at prediction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayesClassifier {
    classes: Vec<String>,
    class_log_prior: Vec<f64>,
    vocabulary: BTreeMap<String, usize>,
    /// `[class][feature]` smoothed log-probabilities.
    feature_log_prob: Vec<Vec<f64>>,
}

fn feature_key(name: &str, value: &str) -> String {
    format!("{name}={value}")
}

impl NaiveBayesClassifier {
    /// Fit with Laplace/Lidstone smoothing `alpha`.
    pub fn fit(pairs: &[TrainingPair], alpha: f64) -> Result<Self, ClassifierError> {
        if pairs.is_empty() {
            return Err(ClassifierError::NoInstances);
        }
        if alpha.is_nan() || alpha <= 0.0 {
            return Err(ClassifierError::Training(format!(
                "smoothing must be positive, got {alpha}"
            )));
        }
        let _span = debug_span!("naive_bayes_fit", instances = pairs.len()).entered();

        let classes: Vec<String> = pairs
            .iter()
            .map(|p| p.label.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        let class_index: BTreeMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut vocabulary = BTreeMap::new();
        for pair in pairs {
            for (name, value) in pair.features.pairs() {
                let next = vocabulary.len();
                vocabulary.entry(feature_key(name, value)).or_insert(next);
            }
        }

        let mut class_counts = vec![0usize; classes.len()];
        let mut feature_counts = vec![vec![0.0f64; vocabulary.len()]; classes.len()];
        for pair in pairs {
            let class = class_index[pair.label.as_str()];
            class_counts[class] += 1;
            for (name, value) in pair.features.pairs() {
                if let Some(&feature) = vocabulary.get(&feature_key(name, value)) {
                    feature_counts[class][feature] += 1.0;
                }
            }
        }

        let total = pairs.len() as f64;
        let class_log_prior = class_counts
            .iter()
            .map(|&count| (count as f64 / total).ln())
            .collect();
        let n_features = vocabulary.len() as f64;
        let feature_log_prob = feature_counts
            .into_iter()
            .map(|counts| {
                let denominator = (counts.iter().sum::<f64>() + alpha * n_features).ln();
                counts
                    .into_iter()
                    .map(|count| (count + alpha).ln() - denominator)
                    .collect()
            })
            .collect();

        debug!(classes = classes.len(), features = vocabulary.len(), "naive bayes fitted");
        Ok(Self {
            classes,
            class_log_prior,
            vocabulary,
            feature_log_prob,
        })
    }

    /// The known labels, in lexicographic order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

impl ClassifierAdaptor for NaiveBayesClassifier {
    fn train(pairs: &[TrainingPair]) -> Result<Self, ClassifierError> {
        Self::fit(pairs, DEFAULT_ALPHA)
    }

    fn prob_classify(&self, features: &Features) -> Vec<(String, f64)> {
        let active: Vec<usize> = features
            .pairs()
            .iter()
            .filter_map(|(name, value)| self.vocabulary.get(&feature_key(name, value)).copied())
            .collect();

        let joint: Vec<f64> = self
            .class_log_prior
            .iter()
            .zip(&self.feature_log_prob)
            .map(|(prior, log_probs)| prior + active.iter().map(|&f| log_probs[f]).sum::<f64>())
            .collect();

        let max = joint.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = joint.iter().map(|j| (j - max).exp()).collect();
        let total: f64 = exp.iter().sum();

        self.classes
            .iter()
            .cloned()
            .zip(exp.into_iter().map(|e| e / total))
            .collect()
    }
}
