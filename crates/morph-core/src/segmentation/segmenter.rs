use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use super::classification::ClassifierAdaptor;
use super::constraints::{generate_constraints, generate_options, ConstraintSet};
use super::features::{Annotation, Featurizer, TRIM_WIDTH};
use super::search::{ExhaustiveSearch, SearchStrategy};
use super::SegmentationError;

/// One morpheme of a segmented word.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub label: String,
}

impl Segment {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Segments words by solving the span constraints a trained classifier
/// predicts for each position.
#[derive(Debug)]
pub struct ConstraintSegmenter<C> {
    featurizer: Featurizer,
    search: Box<dyn SearchStrategy>,
    classifier: Option<C>,
}

impl<C: ClassifierAdaptor> Default for ConstraintSegmenter<C> {
    fn default() -> Self {
        Self::new(Featurizer::default())
    }
}

impl<C: ClassifierAdaptor> ConstraintSegmenter<C> {
    /// An untrained segmenter.
    pub fn new(featurizer: Featurizer) -> Self {
        Self {
            featurizer,
            search: Box::new(ExhaustiveSearch::new()),
            classifier: None,
        }
    }

    /// A segmenter around an already trained classifier.
    pub fn from_classifier(featurizer: Featurizer, classifier: C) -> Self {
        Self {
            classifier: Some(classifier),
            ..Self::new(featurizer)
        }
    }

    pub fn with_search(mut self, search: impl SearchStrategy + 'static) -> Self {
        self.search = Box::new(search);
        self
    }

    pub fn featurizer(&self) -> &Featurizer {
        &self.featurizer
    }

    pub fn classifier(&self) -> Option<&C> {
        self.classifier.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.classifier.is_some()
    }

    /// Train a fresh classifier on `shapes` and their annotations,
    /// replacing any previous one.
    pub fn train<S, A>(&mut self, shapes: &[S], annotations: &[A]) -> Result<(), SegmentationError>
    where
        S: AsRef<str>,
        A: AsRef<[Annotation]>,
    {
        if shapes.len() != annotations.len() {
            return Err(SegmentationError::CountMismatch {
                shapes: shapes.len(),
                annotations: annotations.len(),
            });
        }
        let _span = debug_span!("train_segmenter", shapes = shapes.len()).entered();

        let mut pairs = Vec::new();
        for (shape, annotation) in shapes.iter().zip(annotations) {
            let tokens = self.featurizer.tokenize(shape.as_ref());
            let labels = self.featurizer.label(&tokens, annotation.as_ref())?;
            pairs.extend(self.featurizer.convert_pairs(&tokens, &labels)?);
        }
        debug!(instances = pairs.len(), "training classifier");

        self.classifier = Some(C::train(&pairs)?);
        Ok(())
    }

    /// Segment `text` into labelled morphemes.
    pub fn annotate(&self, text: &str) -> Result<Vec<Segment>, SegmentationError> {
        self.annotate_tokens(&self.featurizer.tokenize(text))
    }

    /// Segment an already tokenized word.
    pub fn annotate_tokens<S: AsRef<str>>(
        &self,
        tokens: &[S],
    ) -> Result<Vec<Segment>, SegmentationError> {
        let classifier = self.classifier.as_ref().ok_or(SegmentationError::NotTrained)?;
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let _span = debug_span!("annotate", tokens = tokens.len()).entered();

        let mut constraints = ConstraintSet::new();
        for (i, features) in self.featurizer.convert_features(tokens).iter().enumerate() {
            let distribution = classifier.prob_classify(features);
            constraints.merge(generate_constraints(&distribution, i + 2)?);
        }
        let options = generate_options(tokens.len(), &constraints, self.featurizer.pad_token());
        debug!(constraints = constraints.len(), positions = options.len());

        let best = self.search.search(&options, &constraints)?;
        let labels = &best[TRIM_WIDTH..best.len() - TRIM_WIDTH];
        Ok(self.merge_labels(tokens, labels))
    }

    /// The morpheme texts of `text`.
    pub fn segment(&self, text: &str) -> Result<Vec<String>, SegmentationError> {
        Ok(self.annotate(text)?.into_iter().map(|s| s.text).collect())
    }

    /// The morpheme labels of `text`.
    pub fn label(&self, text: &str) -> Result<Vec<String>, SegmentationError> {
        Ok(self.annotate(text)?.into_iter().map(|s| s.label).collect())
    }

    /// Group tokens into segments: every label other than the inside label
    /// opens a new segment. Tokens before the first opening label join the
    /// first segment.
    ///
    /// A word with no opening label becomes one segment carrying the inside
    /// label instead of an empty analysis, so every token of `text` stays in
    /// the output.
    fn merge_labels<S: AsRef<str>>(&self, tokens: &[S], labels: &[String]) -> Vec<Segment> {
        let inside = self.featurizer.segment_inside_label();
        let mut segments: Vec<Segment> = Vec::new();
        let mut leading = String::new();

        for (token, label) in tokens.iter().zip(labels) {
            let token = token.as_ref();
            if label != inside {
                let mut text = std::mem::take(&mut leading);
                text.push_str(token);
                segments.push(Segment::new(text, label.as_str()));
            } else if let Some(last) = segments.last_mut() {
                last.text.push_str(token);
            } else {
                leading.push_str(token);
            }
        }

        if !leading.is_empty() {
            segments.push(Segment::new(leading, inside));
        }
        segments
    }
}
