use serde::Serialize;

use morph_core::levenshtein::{self, AlignmentError, EditOperation};

#[derive(Debug, Serialize)]
pub struct Alignment {
    pub distance: usize,
    pub operations: Vec<String>,
    /// One label per origin char, carrying the edit directives.
    pub labels: Vec<String>,
    /// The origin with every operation applied.
    pub applied: String,
}

pub fn align_words(origin: &str, target: &str) -> Result<Alignment, AlignmentError> {
    let origin_chars: Vec<char> = origin.chars().collect();
    let target_chars: Vec<char> = target.chars().collect();
    let ops: Vec<EditOperation> = levenshtein::operations(&origin_chars, &target_chars).collect();

    Ok(Alignment {
        distance: levenshtein::distance(&origin_chars, &target_chars),
        operations: ops.iter().map(ToString::to_string).collect(),
        labels: levenshtein::annotate(&origin_chars, &target_chars, ops.iter().cloned(), None)?,
        applied: levenshtein::apply_operations_str(origin, target, ops)?,
    })
}

pub fn align(origin: &str, target: &str, json: bool) {
    let alignment = die!(align_words(origin, target), "Error aligning: {}");
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&alignment).expect("JSON serialization failed")
        );
        return;
    }
    println!("distance: {}", alignment.distance);
    for op in &alignment.operations {
        println!("  {op}");
    }
    println!("labels: {}", alignment.labels.join(" "));
    println!("applied: {}", alignment.applied);
}
