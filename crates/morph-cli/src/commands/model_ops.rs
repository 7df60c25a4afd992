use std::path::Path;

use serde::Serialize;
use tracing::warn;

use morph_core::data::{self, Instance};
use morph_core::segmentation::{
    ConstraintSegmenter, ExhaustiveSearch, Featurizer, NaiveBayesClassifier, Segment,
    SegmentationError, SegmenterModel,
};
use morph_core::settings::{settings, Settings};

use super::format_analysis;

/// Train a segmenter on `instances` with the featurizer and search settings.
pub fn train_segmenter(
    settings: &Settings,
    instances: &[Instance],
) -> Result<ConstraintSegmenter<NaiveBayesClassifier>, SegmentationError> {
    let featurizer = Featurizer::from_settings(&settings.featurizer)?;
    let mut segmenter = ConstraintSegmenter::new(featurizer)
        .with_search(ExhaustiveSearch::from_settings(&settings.search));
    let shapes: Vec<&str> = instances.iter().map(|i| i.shape.as_str()).collect();
    let annotations: Vec<_> = instances.iter().map(Instance::annotations).collect();
    segmenter.train(&shapes, &annotations)?;
    Ok(segmenter)
}

pub fn train(train_file: &str, output_file: &str) {
    let instances = die!(
        data::load_file(Path::new(train_file)),
        "Error reading {train_file}: {}"
    );
    let segmenter = die!(
        train_segmenter(settings(), &instances),
        "Error training: {}"
    );
    let model = die!(
        SegmenterModel::from_segmenter(&segmenter),
        "Error building model: {}"
    );
    die!(
        model.save(Path::new(output_file)),
        "Error writing {output_file}: {}"
    );
    println!(
        "Trained on {} instances ({} classes), saved to {output_file}",
        instances.len(),
        model.classifier.classes().len()
    );
}

#[derive(Debug, Serialize)]
struct SegmentOutput<'a> {
    word: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    segments: Option<Vec<Segment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn segment(model_file: &str, words: &[String], json: bool) {
    let model = die!(
        SegmenterModel::open(Path::new(model_file)),
        "Error opening model: {}"
    );
    let segmenter = die!(model.into_segmenter(), "Error loading model: {}")
        .with_search(ExhaustiveSearch::from_settings(&settings().search));

    let outputs: Vec<SegmentOutput> = words
        .iter()
        .map(|word| match segmenter.annotate(word) {
            Ok(segments) => SegmentOutput {
                word,
                segments: Some(segments),
                error: None,
            },
            Err(e) => {
                warn!(word = %word, error = %e, "segmentation failed");
                SegmentOutput {
                    word,
                    segments: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outputs).expect("JSON serialization failed")
        );
        return;
    }
    for output in &outputs {
        match (&output.segments, &output.error) {
            (Some(segments), _) => println!("{}\t{}", output.word, format_analysis(segments)),
            (None, Some(e)) => println!("{}\t<{e}>", output.word),
            (None, None) => println!("{}", output.word),
        }
    }
}

#[cfg(test)]
mod tests {
    use morph_core::settings::{default_toml, parse_settings_toml};

    use super::*;

    #[test]
    fn trained_segmenter_survives_save_and_open() {
        let settings = parse_settings_toml(default_toml()).unwrap();
        let instances =
            data::load_str("nikamik\nni kamik\n1 boot\n\nkamikka\nkamik ka\nboot PL\n").unwrap();
        let segmenter = train_segmenter(&settings, &instances).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segmenter.mseg");
        SegmenterModel::from_segmenter(&segmenter)
            .unwrap()
            .save(&path)
            .unwrap();
        let restored = SegmenterModel::open(&path).unwrap().into_segmenter().unwrap();

        assert_eq!(
            restored.segment("nikamik").unwrap(),
            segmenter.segment("nikamik").unwrap()
        );
        assert_eq!(restored.segment("nikamik").unwrap(), vec!["ni", "kamik"]);
    }

    #[test]
    fn training_needs_instances() {
        let settings = parse_settings_toml(default_toml()).unwrap();
        assert!(train_segmenter(&settings, &[]).is_err());
    }
}
