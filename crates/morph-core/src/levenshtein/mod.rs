//! Levenshtein alignment over arbitrary token sequences.
//!
//! Unlike a plain edit-distance routine, the operations produced here are
//! detached from the pair they were computed on: each one addresses the
//! origin's own positions, so it can be replayed onto a copy of the origin
//! ([`apply_operations`]) or onto a parallel array of labels ([`annotate`])
//! using any reference sequence for the incoming tokens.

mod operation;

use std::fmt::Display;

use tracing::debug;

pub use operation::EditOperation;

/// Every directive written by [`annotate`] starts with this marker.
pub const DIRECTIVE_MARKER: char = '+';

/// Opening of the directive recorded for an insertion.
pub const INSERT_DIRECTIVE: &str = "+I(";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlignmentError {
    #[error("origin position {pos} out of range ({len} origin tokens)")]
    OriginOutOfRange { pos: usize, len: usize },

    #[error("reference position {pos} out of range ({len} reference tokens)")]
    ReferenceOutOfRange { pos: usize, len: usize },

    #[error("{labels} initial labels provided for {tokens} origin tokens")]
    LabelCountMismatch { tokens: usize, labels: usize },
}

/// Row-major edit-distance matrix with `origin.len() + 1` rows and
/// `target.len() + 1` columns.
struct EditMatrix {
    cols: usize,
    cells: Vec<usize>,
}

impl EditMatrix {
    fn build<T: PartialEq>(origin: &[T], target: &[T]) -> Self {
        let rows = origin.len() + 1;
        let cols = target.len() + 1;
        let mut cells = vec![0; rows * cols];

        for i in 0..rows {
            cells[i * cols] = i;
        }
        for (j, cell) in cells.iter_mut().enumerate().take(cols) {
            *cell = j;
        }

        for i in 1..rows {
            for j in 1..cols {
                let sub_cost = usize::from(origin[i - 1] != target[j - 1]);
                let deletion = cells[(i - 1) * cols + j] + 1;
                let insertion = cells[i * cols + j - 1] + 1;
                let substitution = cells[(i - 1) * cols + j - 1] + sub_cost;
                cells[i * cols + j] = deletion.min(insertion).min(substitution);
            }
        }

        Self { cols, cells }
    }

    fn get(&self, i: usize, j: usize) -> usize {
        self.cells[i * self.cols + j]
    }

    fn distance(&self) -> usize {
        self.cells[self.cells.len() - 1]
    }
}

/// Minimum number of single-token insertions, deletions and substitutions
/// needed to turn `origin` into `target`.
pub fn distance<T: PartialEq>(origin: &[T], target: &[T]) -> usize {
    EditMatrix::build(origin, target).distance()
}

/// Lazy backtrace over the edit matrix, yielding operations from the end of
/// both sequences toward their start.
pub struct Operations<'a, T> {
    origin: &'a [T],
    target: &'a [T],
    matrix: EditMatrix,
    i: usize,
    j: usize,
}

impl<T: PartialEq> Iterator for Operations<'_, T> {
    type Item = EditOperation;

    fn next(&mut self) -> Option<EditOperation> {
        loop {
            let (i, j) = (self.i, self.j);
            if self.matrix.get(i, j) == 0 {
                return None;
            }
            if i == 0 {
                self.j -= 1;
                return Some(EditOperation::Prepend { target: j - 1 });
            }
            if j == 0 {
                self.i -= 1;
                return Some(EditOperation::Delete { origin: i - 1 });
            }
            if self.origin[i - 1] == self.target[j - 1] {
                self.i -= 1;
                self.j -= 1;
                continue;
            }

            // First minimum wins, checked up, diagonal, left.
            let up = self.matrix.get(i - 1, j);
            let diagonal = self.matrix.get(i - 1, j - 1);
            let left = self.matrix.get(i, j - 1);
            let op = if up <= diagonal && up <= left {
                self.i -= 1;
                EditOperation::Delete { origin: i - 1 }
            } else if diagonal <= left {
                self.i -= 1;
                self.j -= 1;
                EditOperation::Replace {
                    origin: i - 1,
                    target: j - 1,
                }
            } else {
                self.j -= 1;
                EditOperation::Insert {
                    origin: i - 1,
                    target: j - 1,
                }
            };
            return Some(op);
        }
    }
}

/// Operations that achieve the minimum edit distance from `origin` to
/// `target`, in end-to-start order.
pub fn operations<'a, T: PartialEq>(origin: &'a [T], target: &'a [T]) -> Operations<'a, T> {
    let matrix = EditMatrix::build(origin, target);
    debug!(
        origin_len = origin.len(),
        target_len = target.len(),
        distance = matrix.distance(),
        "edit matrix built"
    );
    Operations {
        origin,
        target,
        matrix,
        i: origin.len(),
        j: target.len(),
    }
}

/// One origin position while operations are being replayed: the current
/// token (if not deleted) followed by the tokens inserted after it.
struct Slot<T> {
    head: Option<T>,
    inserted: Vec<T>,
}

/// Apply `ops` to a copy of `origin`, taking new tokens from `reference`.
///
/// Several operations may address the same position: an insertion always
/// lands directly after the position's current token, ahead of anything
/// inserted there earlier, and replacements and deletions only touch that
/// token.
pub fn apply_operations<T, I>(
    origin: &[T],
    reference: &[T],
    ops: I,
) -> Result<Vec<T>, AlignmentError>
where
    T: Clone,
    I: IntoIterator<Item = EditOperation>,
{
    let mut leading: Vec<T> = Vec::new();
    let mut slots: Vec<Slot<T>> = origin
        .iter()
        .map(|token| Slot {
            head: Some(token.clone()),
            inserted: Vec::new(),
        })
        .collect();

    for op in ops {
        match op {
            EditOperation::Replace { origin: pos, target } => {
                let token = reference_token(reference, target)?.clone();
                slot_mut(&mut slots, pos)?.head = Some(token);
            }
            EditOperation::Insert { origin: pos, target } => {
                let token = reference_token(reference, target)?.clone();
                slot_mut(&mut slots, pos)?.inserted.insert(0, token);
            }
            EditOperation::Prepend { target } => {
                leading.insert(0, reference_token(reference, target)?.clone());
            }
            EditOperation::Delete { origin: pos } => {
                slot_mut(&mut slots, pos)?.head = None;
            }
        }
    }

    let mut output = leading;
    for slot in slots {
        output.extend(slot.head);
        output.extend(slot.inserted);
    }
    Ok(output)
}

/// [`apply_operations`] over the characters of two strings.
pub fn apply_operations_str<I>(
    origin: &str,
    reference: &str,
    ops: I,
) -> Result<String, AlignmentError>
where
    I: IntoIterator<Item = EditOperation>,
{
    let origin: Vec<char> = origin.chars().collect();
    let reference: Vec<char> = reference.chars().collect();
    Ok(apply_operations(&origin, &reference, ops)?
        .into_iter()
        .collect())
}

/// Record `ops` as directives on a label array parallel to `origin`.
///
/// Labels default to the origin tokens themselves. Replacements append
/// `+R(from,to)`, insertions append `+I(to)` and deletions rewrite the label
/// as `+D(from)` followed by whatever directives it already carried. Labels
/// left starting with a directive are then folded into the label before
/// them, so the result holds one label per surviving origin token.
pub fn annotate<T, I>(
    origin: &[T],
    reference: &[T],
    ops: I,
    initial_labels: Option<Vec<String>>,
) -> Result<Vec<String>, AlignmentError>
where
    T: Display,
    I: IntoIterator<Item = EditOperation>,
{
    let mut labels = match initial_labels {
        Some(labels) if labels.len() != origin.len() => {
            return Err(AlignmentError::LabelCountMismatch {
                tokens: origin.len(),
                labels: labels.len(),
            });
        }
        Some(labels) => labels,
        None => origin.iter().map(ToString::to_string).collect(),
    };
    if labels.is_empty() {
        return Ok(labels);
    }

    for op in ops {
        match op {
            EditOperation::Replace { origin: pos, target } => {
                let from = origin_token(origin, pos)?;
                let to = reference_token(reference, target)?;
                labels[pos].push_str(&format!("+R({from},{to})"));
            }
            EditOperation::Insert { origin: pos, target } => {
                origin_token(origin, pos)?;
                let to = reference_token(reference, target)?;
                labels[pos].push_str(&format!("{INSERT_DIRECTIVE}{to})"));
            }
            EditOperation::Prepend { target } => {
                let to = reference_token(reference, target)?;
                labels[0].push_str(&format!("{INSERT_DIRECTIVE}{to})"));
            }
            EditOperation::Delete { origin: pos } => {
                let from = origin_token(origin, pos)?;
                let label = &labels[pos];
                let directives = label
                    .find(DIRECTIVE_MARKER)
                    .map_or("", |at| &label[at..]);
                let rewritten = format!("+D({from}){directives}");
                labels[pos] = rewritten;
            }
        }
    }

    Ok(fold_directives(labels))
}

/// Fold labels that start with a directive into the preceding label.
/// Directives with nothing before them go to the first surviving label.
fn fold_directives(labels: Vec<String>) -> Vec<String> {
    let mut folded: Vec<String> = Vec::with_capacity(labels.len());
    let mut orphaned = String::new();

    for label in labels {
        if label.starts_with(DIRECTIVE_MARKER) {
            match folded.last_mut() {
                Some(prev) => prev.push_str(&label),
                None => orphaned.push_str(&label),
            }
        } else {
            let mut label = label;
            if folded.is_empty() {
                label.push_str(&std::mem::take(&mut orphaned));
            }
            folded.push(label);
        }
    }

    if folded.is_empty() && !orphaned.is_empty() {
        folded.push(orphaned);
    }
    folded
}

fn origin_token<T>(origin: &[T], pos: usize) -> Result<&T, AlignmentError> {
    origin.get(pos).ok_or(AlignmentError::OriginOutOfRange {
        pos,
        len: origin.len(),
    })
}

fn reference_token<T>(reference: &[T], pos: usize) -> Result<&T, AlignmentError> {
    reference.get(pos).ok_or(AlignmentError::ReferenceOutOfRange {
        pos,
        len: reference.len(),
    })
}

fn slot_mut<T>(slots: &mut [Slot<T>], pos: usize) -> Result<&mut Slot<T>, AlignmentError> {
    let len = slots.len();
    slots
        .get_mut(pos)
        .ok_or(AlignmentError::OriginOutOfRange { pos, len })
}
