//! Constraint-based segmentation of word shapes into labelled morphemes.
//!
//! Training labels every shape token by aligning the annotated segments onto
//! the shape, then fits a classifier over trigram labels of padded context
//! windows. Segmentation turns each window's predicted distribution into
//! weighted span constraints and picks the label sequence that satisfies the
//! most constraint weight.

pub mod classification;
pub mod constraints;
pub mod features;
pub mod model;
pub mod search;
mod segmenter;

pub use classification::{ClassifierAdaptor, ClassifierError, NaiveBayesClassifier};
pub use constraints::{generate_constraints, generate_options, Constraint, ConstraintSet};
pub use features::{
    Annotation, CharTokenizer, FeaturizationError, Featurizer, Features, LabelMode,
    RegexTokenizer, Tokenizer, TrainingPair,
};
pub use model::{ModelError, SegmenterModel};
pub use search::{ExhaustiveSearch, SearchStrategy};
pub use segmenter::{ConstraintSegmenter, Segment};

#[derive(Debug, thiserror::Error)]
pub enum SegmentationError {
    #[error("the segmenter has not been trained")]
    NotTrained,

    #[error("there are {shapes} shapes but {annotations} annotations")]
    CountMismatch { shapes: usize, annotations: usize },

    #[error("label {0:?} is not a trigram label")]
    MalformedTrigram(String),

    #[error("constraint index {index} leaves no room for a preceding position")]
    InvalidIndex { index: usize },

    #[error("{candidates} candidate sequences exceed the limit of {limit}")]
    SearchSpaceTooLarge { candidates: usize, limit: usize },

    #[error("no candidate label sequences")]
    NoCandidates,

    #[error(transparent)]
    Featurization(#[from] FeaturizationError),

    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),
}
