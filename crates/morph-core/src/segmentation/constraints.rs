use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;

use tracing::debug;

use super::features::{LABEL_DELIMITER, TRIM_WIDTH};
use super::SegmentationError;

/// A claim that the labels over `[start, end)` of a candidate sequence,
/// joined with `-`, equal `label`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Constraint {
    pub start: usize,
    pub end: usize,
    pub label: String,
}

impl Constraint {
    pub fn new(span: Range<usize>, label: impl Into<String>) -> Self {
        Self {
            start: span.start,
            end: span.end,
            label: label.into(),
        }
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The per-position labels this constraint asks for.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.label.split(LABEL_DELIMITER)
    }

    /// Spans running past the end of `sequence` are never satisfied.
    pub fn is_satisfied<S: AsRef<str>>(&self, sequence: &[S]) -> bool {
        match sequence.get(self.span()) {
            Some(window) => self.components().eq(window.iter().map(|s| s.as_ref())),
            None => false,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})->{}", self.start, self.end, self.label)
    }
}

/// Weighted constraints keyed by span and label. Adding a constraint that
/// is already present sums the weights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    weights: BTreeMap<Constraint, f64>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, constraint: Constraint, weight: f64) {
        *self.weights.entry(constraint).or_insert(0.0) += weight;
    }

    pub fn merge(&mut self, other: ConstraintSet) {
        for (constraint, weight) in other.weights {
            self.add(constraint, weight);
        }
    }

    pub fn weight(&self, constraint: &Constraint) -> Option<f64> {
        self.weights.get(constraint).copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Constraint, f64)> {
        self.weights.iter().map(|(c, w)| (c, *w))
    }

    /// Total weight of the constraints `candidate` satisfies.
    pub fn score<S: AsRef<str>>(&self, candidate: &[S]) -> f64 {
        self.iter()
            .filter(|(constraint, _)| constraint.is_satisfied(candidate))
            .map(|(_, weight)| weight)
            .sum()
    }
}

impl FromIterator<(Constraint, f64)> for ConstraintSet {
    fn from_iter<I: IntoIterator<Item = (Constraint, f64)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (constraint, weight) in iter {
            set.add(constraint, weight);
        }
        set
    }
}

fn split_trigram(label: &str) -> Result<[&str; 3], SegmentationError> {
    let mut parts = label.split(LABEL_DELIMITER);
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(prefix), Some(focus), Some(suffix), None) => Ok([prefix, focus, suffix]),
        _ => Err(SegmentationError::MalformedTrigram(label.to_string())),
    }
}

/// Turn one position's label distribution into weighted span constraints.
///
/// The most probable trigram label becomes a constraint over
/// `[index - 1, index + 2)`. Its unigram and bigram pieces become
/// sub-constraints weighted by the total probability of every trigram that
/// agrees with them at the same positions.
pub fn generate_constraints(
    distribution: &[(String, f64)],
    index: usize,
) -> Result<ConstraintSet, SegmentationError> {
    let mut constraints = ConstraintSet::new();
    let Some((top_label, top_weight)) = distribution
        .iter()
        .fold(None, |best: Option<&(String, f64)>, entry| match best {
            Some(best) if best.1 >= entry.1 => Some(best),
            _ => Some(entry),
        })
    else {
        return Ok(constraints);
    };
    if index == 0 {
        return Err(SegmentationError::InvalidIndex { index });
    }

    let [prefix, focus, suffix] = split_trigram(top_label)?;
    let start = index - 1;
    constraints.add(Constraint::new(start..index + 2, top_label.as_str()), *top_weight);

    let prefix_unigram = Constraint::new(start..index, prefix);
    let focus_unigram = Constraint::new(index..index + 1, focus);
    let suffix_unigram = Constraint::new(index + 1..index + 2, suffix);
    let prefix_bigram = Constraint::new(start..index + 1, [prefix, focus].join(LABEL_DELIMITER));
    let suffix_bigram = Constraint::new(index..index + 2, [focus, suffix].join(LABEL_DELIMITER));

    for (label, weight) in distribution {
        let [p, f, s] = split_trigram(label)?;
        if p == prefix {
            constraints.add(prefix_unigram.clone(), *weight);
        }
        if f == focus {
            constraints.add(focus_unigram.clone(), *weight);
        }
        if s == suffix {
            constraints.add(suffix_unigram.clone(), *weight);
        }
        if p == prefix && f == focus {
            constraints.add(prefix_bigram.clone(), *weight);
        }
        if f == focus && s == suffix {
            constraints.add(suffix_bigram.clone(), *weight);
        }
    }

    Ok(constraints)
}

/// Candidate labels per position of a padded sequence of `len` tokens.
///
/// The result always has `len + 6` positions. Every component of every
/// constraint label is an option at its position; positions no constraint
/// reaches hold just `pad_token`.
pub fn generate_options(
    len: usize,
    constraints: &ConstraintSet,
    pad_token: &str,
) -> Vec<BTreeSet<String>> {
    let mut options = vec![BTreeSet::new(); len + 2 * TRIM_WIDTH];

    for (constraint, _) in constraints.iter() {
        for (offset, label) in constraint.components().enumerate() {
            match options.get_mut(constraint.start + offset) {
                Some(option) => {
                    option.insert(label.to_string());
                }
                None => debug!(%constraint, "constraint reaches past the padded sequence"),
            }
        }
    }

    for option in options.iter_mut().filter(|o| o.is_empty()) {
        option.insert(pad_token.to_string());
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distribution(items: &[(&str, f64)]) -> Vec<(String, f64)> {
        items.iter().map(|&(l, w)| (l.to_string(), w)).collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn assert_weight(constraints: &ConstraintSet, constraint: Constraint, expected: f64) {
        let weight = constraints
            .weight(&constraint)
            .unwrap_or_else(|| panic!("missing {constraint}"));
        assert!((weight - expected).abs() < 1e-9, "{constraint}: {weight} != {expected}");
    }

    #[test]
    fn generates_trigram_and_voted_sub_constraints() {
        let dist = distribution(&[
            ("_-_-FOO", 0.9),
            ("_-FOO-BAR", 0.02),
            ("FOO-BAR-_", 0.03),
            ("BAR-_-_", 0.5),
        ]);
        let constraints = generate_constraints(&dist, 3).unwrap();

        assert_eq!(constraints.len(), 6);
        assert_weight(&constraints, Constraint::new(2..5, "_-_-FOO"), 0.9);
        assert_weight(&constraints, Constraint::new(2..3, "_"), 0.92);
        assert_weight(&constraints, Constraint::new(3..4, "_"), 1.4);
        assert_weight(&constraints, Constraint::new(4..5, "FOO"), 0.9);
        assert_weight(&constraints, Constraint::new(2..4, "_-_"), 0.9);
        assert_weight(&constraints, Constraint::new(3..5, "_-FOO"), 0.9);
    }

    #[test]
    fn first_maximum_wins() {
        let dist = distribution(&[("A-B-C", 0.5), ("D-E-F", 0.5)]);
        let constraints = generate_constraints(&dist, 2).unwrap();
        assert!(constraints.weight(&Constraint::new(1..4, "A-B-C")).is_some());
        assert!(constraints.weight(&Constraint::new(1..4, "D-E-F")).is_none());
    }

    #[test]
    fn empty_distribution() {
        assert!(generate_constraints(&[], 3).unwrap().is_empty());
    }

    #[test]
    fn malformed_trigram() {
        let dist = distribution(&[("A-B", 1.0)]);
        assert!(matches!(
            generate_constraints(&dist, 3),
            Err(SegmentationError::MalformedTrigram(label)) if label == "A-B"
        ));
    }

    #[test]
    fn index_zero_rejected() {
        let dist = distribution(&[("A-B-C", 1.0)]);
        assert!(matches!(
            generate_constraints(&dist, 0),
            Err(SegmentationError::InvalidIndex { index: 0 })
        ));
    }

    #[test]
    fn set_sums_duplicate_keys() {
        let mut constraints = ConstraintSet::new();
        constraints.add(Constraint::new(0..1, "A"), 0.25);
        constraints.add(Constraint::new(0..1, "A"), 0.5);
        constraints.add(Constraint::new(0..1, "B"), 0.1);
        assert_eq!(constraints.len(), 2);
        assert_weight(&constraints, Constraint::new(0..1, "A"), 0.75);

        let other: ConstraintSet = [(Constraint::new(0..1, "B"), 0.2)].into_iter().collect();
        constraints.merge(other);
        assert_weight(&constraints, Constraint::new(0..1, "B"), 0.3);
    }

    #[test]
    fn satisfaction_and_score() {
        let candidate = ["_", "FOO", "BAR", "_"];
        assert!(Constraint::new(1..3, "FOO-BAR").is_satisfied(&candidate));
        assert!(!Constraint::new(1..3, "FOO-_").is_satisfied(&candidate));
        assert!(!Constraint::new(3..5, "_-_").is_satisfied(&candidate));

        let constraints: ConstraintSet = [
            (Constraint::new(1..3, "FOO-BAR"), 0.5),
            (Constraint::new(0..1, "_"), 0.25),
            (Constraint::new(2..3, "FOO"), 4.0),
        ]
        .into_iter()
        .collect();
        assert!((constraints.score(&candidate) - 0.75).abs() < 1e-9);
    }

    fn option_constraints() -> ConstraintSet {
        [
            (Constraint::new(0..3, "_-_-FOO"), 0.9),
            (Constraint::new(0..1, "_"), 0.92),
            (Constraint::new(1..2, "_"), 1.4),
            (Constraint::new(2..3, "FOO"), 0.9),
            (Constraint::new(0..2, "_-_"), 0.9),
            (Constraint::new(1..3, "_-FOO"), 0.9),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn options_have_six_extra_positions() {
        assert_eq!(generate_options(3, &option_constraints(), "_").len(), 9);
        assert_eq!(generate_options(0, &ConstraintSet::new(), "_").len(), 6);
    }

    #[test]
    fn options_default_to_pad() {
        let constraints: ConstraintSet = [
            (Constraint::new(1..2, "_"), 1.4),
            (Constraint::new(2..3, "FOO"), 0.9),
            (Constraint::new(1..3, "_-FOO"), 0.9),
        ]
        .into_iter()
        .collect();
        let options = generate_options(3, &constraints, "#");
        assert_eq!(options[0], set(&["#"]));
        assert_eq!(options[1], set(&["_"]));
    }

    #[test]
    fn options_collect_every_component() {
        let mut constraints = option_constraints();
        constraints.add(Constraint::new(1..3, "_-BAR"), 0.9);
        let options = generate_options(3, &constraints, "_");
        let mut expected = vec![set(&["_"]); 9];
        expected[2] = set(&["BAR", "FOO"]);
        assert_eq!(options, expected);
    }
}
