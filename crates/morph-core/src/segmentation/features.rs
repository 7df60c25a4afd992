//! Positional trigram-context features and training labels.
//!
//! A shape is padded with [`PAD_WIDTH`] pad tokens on each side and every
//! position between the outer [`TRIM_WIDTH`] tokens becomes one [`Features`]
//! window, so a shape of `n` tokens yields `n + 2` windows: one per token and
//! one boundary window on either side.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::levenshtein::{self, AlignmentError, DIRECTIVE_MARKER, INSERT_DIRECTIVE};
use crate::settings::FeaturizerSettings;

/// Pad tokens added on each side of a shape before windowing.
pub const PAD_WIDTH: usize = 4;

/// Padded positions skipped on each side when emitting windows.
pub const TRIM_WIDTH: usize = 3;

/// Joins the components of a multi-position label.
pub const LABEL_DELIMITER: &str = "-";

/// How much of each per-token training label survives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelMode {
    /// Collapse labels to `B` (begin), `I` (inside) and `O` (pad).
    Basic,
    /// Keep the morpheme label, drop edit directives.
    #[default]
    Normal,
    /// Keep the label with its edit directives.
    Full,
}

impl fmt::Display for LabelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Basic => "basic",
            Self::Normal => "normal",
            Self::Full => "full",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeaturizationError {
    #[error("{tokens} tokens in shape, but {labels} labels provided")]
    LengthMismatch { tokens: usize, labels: usize },

    #[error("alignment failed: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("invalid token pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// The context window around one padded position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Features {
    pub prefix: String,
    pub focus: String,
    pub suffix: String,
}

impl Features {
    pub fn new(
        prefix: impl Into<String>,
        focus: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            focus: focus.into(),
            suffix: suffix.into(),
        }
    }

    /// Named feature values, in a fixed order.
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            ("prefix", &self.prefix),
            ("focus", &self.focus),
            ("suffix", &self.suffix),
        ]
    }

    /// The window text: prefix, focus and suffix concatenated.
    pub fn window(&self) -> String {
        [self.prefix.as_str(), &self.focus, &self.suffix].concat()
    }
}

/// A feature window with its trigram label (`prev-focus-next`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingPair {
    pub features: Features,
    pub label: String,
}

/// One labelled morpheme of a training word.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub segment: String,
    pub label: String,
}

impl Annotation {
    pub fn new(segment: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            label: label.into(),
        }
    }
}

impl<S: Into<String>, L: Into<String>> From<(S, L)> for Annotation {
    fn from((segment, label): (S, L)) -> Self {
        Self::new(segment, label)
    }
}

/// Splits text into the tokens the featurizer works on.
pub trait Tokenizer: Send + Sync + fmt::Debug {
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// The pattern this tokenizer was built from, if it has one.
    fn pattern(&self) -> Option<&str> {
        None
    }
}

/// One token per `char`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.chars().map(String::from).collect()
    }
}

/// Every non-overlapping match of a pattern is one token; unmatched text
/// is skipped.
#[derive(Debug, Clone)]
pub struct RegexTokenizer {
    regex: Regex,
}

impl RegexTokenizer {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        self.regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn pattern(&self) -> Option<&str> {
        Some(self.regex.as_str())
    }
}

/// Converts shapes into feature windows and training labels.
#[derive(Debug, Clone)]
pub struct Featurizer {
    mode: LabelMode,
    inside_label: String,
    pad_token: String,
    tokenizer: Arc<dyn Tokenizer>,
}

impl Default for Featurizer {
    fn default() -> Self {
        Self {
            mode: LabelMode::default(),
            inside_label: "I".to_string(),
            pad_token: "_".to_string(),
            tokenizer: Arc::new(CharTokenizer),
        }
    }
}

impl Featurizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: LabelMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_inside_label(mut self, label: impl Into<String>) -> Self {
        self.inside_label = label.into();
        self
    }

    pub fn with_pad_token(mut self, token: impl Into<String>) -> Self {
        self.pad_token = token.into();
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: impl Tokenizer + 'static) -> Self {
        self.tokenizer = Arc::new(tokenizer);
        self
    }

    /// Build a featurizer from the `[featurizer]` settings section.
    pub fn from_settings(settings: &FeaturizerSettings) -> Result<Self, FeaturizationError> {
        let featurizer = Self::new()
            .with_mode(settings.mode)
            .with_inside_label(&settings.inside_label)
            .with_pad_token(&settings.pad_token);
        Ok(match settings.token_pattern.as_deref() {
            Some(pattern) => featurizer.with_tokenizer(RegexTokenizer::new(pattern)?),
            None => featurizer,
        })
    }

    pub fn to_settings(&self) -> FeaturizerSettings {
        FeaturizerSettings {
            mode: self.mode,
            inside_label: self.inside_label.clone(),
            pad_token: self.pad_token.clone(),
            token_pattern: self.tokenizer.pattern().map(str::to_string),
        }
    }

    pub fn mode(&self) -> LabelMode {
        self.mode
    }

    pub fn inside_label(&self) -> &str {
        &self.inside_label
    }

    pub fn pad_token(&self) -> &str {
        &self.pad_token
    }

    /// The label marking a non-initial token in the labels [`Self::label`]
    /// produces.
    pub fn segment_inside_label(&self) -> &str {
        match self.mode {
            LabelMode::Basic => "I",
            LabelMode::Normal | LabelMode::Full => &self.inside_label,
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenizer.tokenize(text)
    }

    fn pad<'a>(&'a self, items: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
        let pad = std::iter::repeat(self.pad_token.as_str()).take(PAD_WIDTH);
        pad.clone().chain(items).chain(pad).collect()
    }

    /// Feature windows for every position of `tokens`, including one
    /// boundary window on each side. Empty input yields no windows.
    pub fn convert_features<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<Features> {
        if tokens.is_empty() {
            return Vec::new();
        }
        let padded = self.pad(tokens.iter().map(AsRef::as_ref));
        (TRIM_WIDTH..padded.len() - TRIM_WIDTH)
            .map(|i| Features {
                prefix: padded[i - TRIM_WIDTH..i].concat(),
                focus: padded[i].to_string(),
                suffix: padded[i + 1..=i + TRIM_WIDTH].concat(),
            })
            .collect()
    }

    /// Pair each feature window with the trigram of labels centred on it.
    pub fn convert_pairs<S, L>(
        &self,
        tokens: &[S],
        labels: &[L],
    ) -> Result<Vec<TrainingPair>, FeaturizationError>
    where
        S: AsRef<str>,
        L: AsRef<str>,
    {
        if tokens.len() != labels.len() {
            return Err(FeaturizationError::LengthMismatch {
                tokens: tokens.len(),
                labels: labels.len(),
            });
        }

        let features = self.convert_features(tokens);
        let padded = self.pad(labels.iter().map(AsRef::as_ref));
        Ok(features
            .into_iter()
            .zip(TRIM_WIDTH..)
            .map(|(features, i)| TrainingPair {
                features,
                label: padded[i - 1..i + 2].join(LABEL_DELIMITER),
            })
            .collect())
    }

    /// One training label per token of `tokens`, derived by aligning the
    /// annotation segments onto the shape.
    pub fn label<S: AsRef<str>>(
        &self,
        tokens: &[S],
        annotations: &[Annotation],
    ) -> Result<Vec<String>, FeaturizationError> {
        let shape: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
        let source: Vec<String> = annotations
            .iter()
            .flat_map(|annotation| self.tokenize(&annotation.segment))
            .collect();
        let source: Vec<&str> = source.iter().map(String::as_str).collect();
        let initial = label_annotations(annotations, &self.inside_label, self.tokenizer.as_ref());

        let ops: Vec<_> = levenshtein::operations(&source, &shape).collect();
        let annotated = levenshtein::annotate(&source, &shape, ops, Some(initial))?;

        let mut labels = Vec::with_capacity(shape.len());
        for label in annotated {
            let inserted = label.matches(INSERT_DIRECTIVE).count();
            labels.push(self.format_label(label));
            labels.extend(
                std::iter::repeat_with(|| self.format_label(self.inside_label.clone()))
                    .take(inserted),
            );
        }
        debug!(tokens = shape.len(), labels = labels.len(), "labelled shape");
        Ok(labels)
    }

    /// Apply the label mode to one annotated label.
    pub fn format_label(&self, label: String) -> String {
        let label = match self.mode {
            LabelMode::Full => return label,
            LabelMode::Basic | LabelMode::Normal => match label.find(DIRECTIVE_MARKER) {
                Some(at) => label[..at].to_string(),
                None => label,
            },
        };
        if self.mode == LabelMode::Basic {
            return self.simplify_label(&label).to_string();
        }
        label
    }

    fn simplify_label(&self, label: &str) -> &'static str {
        if label == self.pad_token {
            "O"
        } else if label == self.inside_label {
            "I"
        } else {
            "B"
        }
    }
}

/// Per-token labels for the concatenated annotations: each segment's label
/// on its first token, `inside_label` on the rest. Segments are tokenized
/// one at a time.
pub fn label_annotations(
    annotations: &[Annotation],
    inside_label: &str,
    tokenizer: &dyn Tokenizer,
) -> Vec<String> {
    annotations
        .iter()
        .flat_map(|annotation| {
            let count = tokenizer.tokenize(&annotation.segment).len();
            (0..count).map(move |i| {
                let label = if i == 0 { annotation.label.as_str() } else { inside_label };
                label.to_string()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(items: &[(&str, &str)]) -> Vec<Annotation> {
        items.iter().map(|&pair| Annotation::from(pair)).collect()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn pair(prefix: &str, focus: &str, suffix: &str, label: &str) -> TrainingPair {
        TrainingPair {
            features: Features::new(prefix, focus, suffix),
            label: label.to_string(),
        }
    }

    #[test]
    fn convert_pairs_single_token() {
        let f = Featurizer::new();
        let pairs = f.convert_pairs(&f.tokenize("f"), &["FOO"]).unwrap();
        assert_eq!(
            pairs,
            vec![
                pair("___", "_", "f__", "_-_-FOO"),
                pair("___", "f", "___", "_-FOO-_"),
                pair("__f", "_", "___", "FOO-_-_"),
            ]
        );
    }

    #[test]
    fn convert_pairs_two_tokens() {
        let f = Featurizer::new();
        let pairs = f.convert_pairs(&f.tokenize("fo"), &["FOO", "BAR"]).unwrap();
        assert_eq!(
            pairs,
            vec![
                pair("___", "_", "fo_", "_-_-FOO"),
                pair("___", "f", "o__", "_-FOO-BAR"),
                pair("__f", "o", "___", "FOO-BAR-_"),
                pair("_fo", "_", "___", "BAR-_-_"),
            ]
        );
    }

    #[test]
    fn convert_pairs_multichar_tokens() {
        let f = Featurizer::new();
        let pairs = f.convert_pairs(&["f", "oo"], &["FOO", "BAR"]).unwrap();
        assert_eq!(pairs[0], pair("___", "_", "foo_", "_-_-FOO"));
        assert_eq!(pairs[2], pair("__f", "oo", "___", "FOO-BAR-_"));
        assert_eq!(pairs[3], pair("_foo", "_", "___", "BAR-_-_"));
    }

    #[test]
    fn convert_pairs_with_regex_tokenizer() {
        let f = Featurizer::new().with_tokenizer(RegexTokenizer::new(".&?").unwrap());
        let tokens = f.tokenize("f&");
        assert_eq!(tokens, strings(&["f&"]));
        let pairs = f.convert_pairs(&tokens, &["FOO"]).unwrap();
        assert_eq!(
            pairs,
            vec![
                pair("___", "_", "f&__", "_-_-FOO"),
                pair("___", "f&", "___", "_-FOO-_"),
                pair("__f&", "_", "___", "FOO-_-_"),
            ]
        );
    }

    #[test]
    fn convert_pairs_length_mismatch() {
        let f = Featurizer::new();
        let err = f.convert_pairs(&f.tokenize("f&"), &["FOO"]).unwrap_err();
        assert!(matches!(
            err,
            FeaturizationError::LengthMismatch { tokens: 2, labels: 1 }
        ));
    }

    #[test]
    fn convert_features_empty() {
        let f = Featurizer::new();
        assert!(f.convert_features::<String>(&[]).is_empty());
    }

    #[test]
    fn convert_features_counts() {
        let f = Featurizer::new();
        assert_eq!(f.convert_features(&f.tokenize("f")).len(), 3);
        assert_eq!(f.convert_features(&f.tokenize("fo")).len(), 4);
        assert_eq!(f.convert_features(&f.tokenize("kamikka")).len(), 9);
    }

    #[test]
    fn convert_features_custom_pad() {
        let f = Featurizer::new().with_pad_token("#");
        let features = f.convert_features(&["a"]);
        assert_eq!(features[1], Features::new("###", "a", "###"));
        assert_eq!(features[1].window(), "###a###");
    }

    #[test]
    fn label_empty() {
        let f = Featurizer::new();
        assert!(f.label::<String>(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn label_single_token() {
        let f = Featurizer::new();
        let labels = f.label(&f.tokenize("f"), &annotations(&[("f", "bar")])).unwrap();
        assert_eq!(labels, strings(&["bar"]));
    }

    #[test]
    fn label_pads_with_inside_labels() {
        let f = Featurizer::new();
        let labels = f.label(&f.tokenize("foo"), &annotations(&[("foo", "bar")])).unwrap();
        assert_eq!(labels, strings(&["bar", "I", "I"]));
    }

    #[test]
    fn label_custom_inside_label() {
        let f = Featurizer::new().with_inside_label("FOO");
        let labels = f.label(&f.tokenize("foo"), &annotations(&[("foo", "bar")])).unwrap();
        assert_eq!(labels, strings(&["bar", "FOO", "FOO"]));
    }

    #[test]
    fn label_with_regex_tokenizer() {
        let f = Featurizer::new()
            .with_mode(LabelMode::Full)
            .with_tokenizer(RegexTokenizer::new("._?").unwrap());
        let tokens = f.tokenize("fo_");
        assert_eq!(tokens, strings(&["f", "o_"]));
        let labels = f.label(&tokens, &annotations(&[("foo", "bar")])).unwrap();
        assert_eq!(labels, strings(&["bar", "I+R(o,o_)+D(o)"]));
    }

    #[test]
    fn label_multiple_annotations() {
        let f = Featurizer::new();
        let labels = f
            .label(&f.tokenize("foobaz"), &annotations(&[("foo", "bar"), ("baz", "boo")]))
            .unwrap();
        assert_eq!(labels, strings(&["bar", "I", "I", "boo", "I", "I"]));
    }

    #[test]
    fn label_deleted_token() {
        let f = Featurizer::new().with_mode(LabelMode::Full);
        let labels = f.label(&f.tokenize("ba"), &annotations(&[("baz", "bar")])).unwrap();
        assert_eq!(labels, strings(&["bar", "I+D(z)"]));
    }

    #[test]
    fn label_inserted_token() {
        let f = Featurizer::new().with_mode(LabelMode::Full);
        let labels = f.label(&f.tokenize("baza"), &annotations(&[("baz", "bar")])).unwrap();
        assert_eq!(labels, strings(&["bar", "I", "I+I(a)", "I"]));
    }

    #[test]
    fn label_multiple_inserted_tokens() {
        let f = Featurizer::new().with_mode(LabelMode::Full);
        let labels = f.label(&f.tokenize("bazaa"), &annotations(&[("baz", "bar")])).unwrap();
        assert_eq!(labels, strings(&["bar", "I", "I+I(a)+I(a)", "I", "I"]));
    }

    #[test]
    fn label_normal_strips_directives() {
        let f = Featurizer::new();
        let labels = f
            .label(&f.tokenize("fooba"), &annotations(&[("foo", "bar"), ("baz", "boo")]))
            .unwrap();
        assert_eq!(labels, strings(&["bar", "I", "I", "boo", "I"]));
    }

    #[test]
    fn label_basic_mode() {
        let f = Featurizer::new().with_mode(LabelMode::Basic);
        let labels = f
            .label(
                &f.tokenize("_fooba"),
                &annotations(&[("_", "_"), ("foo", "bar"), ("baz", "boo")]),
            )
            .unwrap();
        assert_eq!(labels, strings(&["O", "B", "I", "I", "B", "I"]));
    }

    #[test]
    fn label_count_follows_shape() {
        let f = Featurizer::new();
        let cases: [(&str, &[(&str, &str)]); 2] = [
            ("kamikka", &[("kamik", "boot"), ("ka", "PL")]),
            ("kamika", &[("kamik", "boot"), ("kka", "PL")]),
        ];
        for (shape, segments) in cases {
            let tokens = f.tokenize(shape);
            let labels = f.label(&tokens, &annotations(segments)).unwrap();
            assert_eq!(labels.len(), tokens.len(), "{shape}");
        }
    }

    #[test]
    fn segment_inside_label_by_mode() {
        let f = Featurizer::new().with_inside_label("IN");
        assert_eq!(f.segment_inside_label(), "IN");
        assert_eq!(f.clone().with_mode(LabelMode::Full).segment_inside_label(), "IN");
        assert_eq!(f.with_mode(LabelMode::Basic).segment_inside_label(), "I");
    }

    #[test]
    fn settings_round_trip() {
        let f = Featurizer::new()
            .with_mode(LabelMode::Basic)
            .with_pad_token("#")
            .with_tokenizer(RegexTokenizer::new(".&?").unwrap());
        let settings = f.to_settings();
        assert_eq!(settings.token_pattern.as_deref(), Some(".&?"));
        let restored = Featurizer::from_settings(&settings).unwrap();
        assert_eq!(restored.mode(), LabelMode::Basic);
        assert_eq!(restored.pad_token(), "#");
        assert_eq!(restored.tokenize("f&o"), strings(&["f&", "o"]));
    }

    #[test]
    fn from_settings_bad_pattern() {
        let mut settings = Featurizer::new().to_settings();
        settings.token_pattern = Some("(".to_string());
        assert!(matches!(
            Featurizer::from_settings(&settings),
            Err(FeaturizationError::Pattern(_))
        ));
    }

    #[test]
    fn label_annotations_marks_first_tokens() {
        assert!(label_annotations(&[], "I", &CharTokenizer).is_empty());
        assert_eq!(
            label_annotations(&annotations(&[("f", "A"), ("b", "B")]), "I", &CharTokenizer),
            strings(&["A", "B"])
        );
        assert_eq!(
            label_annotations(&annotations(&[("foo", "A"), ("bar", "B")]), "I", &CharTokenizer),
            strings(&["A", "I", "I", "B", "I", "I"])
        );
        let tokenizer = RegexTokenizer::new(r".\.?").unwrap();
        assert_eq!(
            label_annotations(&annotations(&[("fo.", "A"), ("b.r", "B")]), "I", &tokenizer),
            strings(&["A", "I", "B", "I"])
        );
    }
}
