//! Training corpus records.
//!
//! A corpus is a sequence of records separated by blank lines. Each record
//! has three lines: the written shape, the space-separated segments and the
//! space-separated segment labels:
//!
//! ```text
//! nikamik
//! ni kamik
//! 1 boot
//! ```

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::segmentation::Annotation;

/// One corpus record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub shape: String,
    pub segments: Vec<String>,
    pub labels: Vec<String>,
}

impl Instance {
    pub fn new(shape: impl Into<String>, segments: Vec<String>, labels: Vec<String>) -> Self {
        Self {
            shape: shape.into(),
            segments,
            labels,
        }
    }

    /// Segments paired with their labels.
    pub fn annotations(&self) -> Vec<Annotation> {
        self.segments
            .iter()
            .zip(&self.labels)
            .map(|(segment, label)| Annotation::new(segment.as_str(), label.as_str()))
            .collect()
    }

    /// Whether the record carries a gold segmentation.
    pub fn is_annotated(&self) -> bool {
        !self.segments.is_empty()
    }

    /// The gold analysis as `segment/label` pairs joined with `-`.
    pub fn annotation_string(&self) -> String {
        self.segments
            .iter()
            .zip(&self.labels)
            .map(|(segment, label)| format!("{segment}/{label}"))
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: not enough fields provided")]
    NotEnoughFields { line: usize },

    #[error("line {line}: too many fields provided")]
    TooManyFields { line: usize },

    #[error("line {line}: {segments} segments but {labels} labels")]
    SegmentLabelMismatch {
        line: usize,
        segments: usize,
        labels: usize,
    },

    #[error("line {line}: empty shape")]
    EmptyShape { line: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Records with only a shape line are rejected by [`load`] and accepted
/// (without gold segments) by [`load_unannotated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strictness {
    Strict,
    Lenient,
}

/// Parse every record in `lines`.
pub fn load<I, S>(lines: I) -> Result<Vec<Instance>, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parse_records(lines, Strictness::Strict)
}

/// Like [`load`], but a record may consist of just its shape line, as in
/// held-out data that only needs segmenting.
pub fn load_unannotated<I, S>(lines: I) -> Result<Vec<Instance>, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parse_records(lines, Strictness::Lenient)
}

pub fn load_str(text: &str) -> Result<Vec<Instance>, ParseError> {
    load(text.lines())
}

pub fn load_file(path: &Path) -> Result<Vec<Instance>, DataError> {
    let text = fs::read_to_string(path)?;
    let instances = load_str(&text)?;
    debug!(path = %path.display(), instances = instances.len(), "corpus loaded");
    Ok(instances)
}

pub fn load_file_unannotated(path: &Path) -> Result<Vec<Instance>, DataError> {
    let text = fs::read_to_string(path)?;
    Ok(load_unannotated(text.lines())?)
}

fn parse_records<I, S>(lines: I, strictness: Strictness) -> Result<Vec<Instance>, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut instances = Vec::new();
    let mut record: Vec<Vec<String>> = Vec::new();
    let mut record_line = 0;

    for (index, line) in lines.into_iter().enumerate() {
        let line = line.as_ref().trim();
        if line.is_empty() {
            if !record.is_empty() {
                instances.push(fit(std::mem::take(&mut record), record_line, strictness)?);
            }
            continue;
        }
        if record.is_empty() {
            record_line = index + 1;
        }
        record.push(line.split_whitespace().map(str::to_string).collect());
    }
    if !record.is_empty() {
        instances.push(fit(record, record_line, strictness)?);
    }
    Ok(instances)
}

fn fit(
    record: Vec<Vec<String>>,
    line: usize,
    strictness: Strictness,
) -> Result<Instance, ParseError> {
    if record.len() > 3 {
        return Err(ParseError::TooManyFields { line });
    }
    let mut fields = record.into_iter();
    let shape: String = fields.next().unwrap_or_default().concat();
    let (segments, labels) = match (fields.next(), fields.next()) {
        (Some(segments), Some(labels)) => (segments, labels),
        (None, None) if strictness == Strictness::Lenient => (Vec::new(), Vec::new()),
        _ => return Err(ParseError::NotEnoughFields { line }),
    };

    if shape.is_empty() {
        return Err(ParseError::EmptyShape { line });
    }
    if segments.len() != labels.len() {
        return Err(ParseError::SegmentLabelMismatch {
            line,
            segments: segments.len(),
            labels: labels.len(),
        });
    }
    Ok(Instance {
        shape,
        segments,
        labels,
    })
}
