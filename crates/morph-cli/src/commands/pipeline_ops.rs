use std::path::Path;

use serde::Serialize;
use tracing::{debug_span, warn};

use morph_core::data::{self, Instance};
use morph_core::labelling::{LabellingError, SequenceLabeller};
use morph_core::segmentation::{
    ConstraintSegmenter, NaiveBayesClassifier, Segment, SegmentationError,
};
use morph_core::settings::{settings, Settings};

use super::format_analysis;
use super::model_ops::train_segmenter;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("segmentation failed: {0}")]
    Segmentation(#[from] SegmentationError),

    #[error("labelling failed: {0}")]
    Labelling(#[from] LabellingError),
}

/// A segmenter followed by a labeller that relabels its segments.
pub struct Pipeline {
    segmenter: ConstraintSegmenter<NaiveBayesClassifier>,
    labeller: SequenceLabeller,
}

impl Pipeline {
    pub fn train(settings: &Settings, instances: &[Instance]) -> Result<Self, PipelineError> {
        let _span = debug_span!("pipeline_train", instances = instances.len()).entered();

        let segmenter = train_segmenter(settings, instances)?;

        let mut labeller: SequenceLabeller = SequenceLabeller::from_settings(&settings.labeller);
        let sequences: Vec<Vec<String>> = instances.iter().map(|i| i.segments.clone()).collect();
        let labels: Vec<Vec<String>> = instances.iter().map(|i| i.labels.clone()).collect();
        labeller.train(&sequences, &labels)?;

        Ok(Self {
            segmenter,
            labeller,
        })
    }

    pub fn predict(&self, shape: &str) -> Result<Vec<Segment>, PipelineError> {
        let segments = self.segmenter.segment(shape)?;
        let labels = self.labeller.label(&segments)?;
        Ok(segments
            .into_iter()
            .zip(labels)
            .map(|(text, label)| Segment::new(text, label))
            .collect())
    }

    pub fn evaluate(&self, instances: &[Instance]) -> Report {
        let results: Vec<InstanceResult> = instances
            .iter()
            .map(|instance| self.evaluate_instance(instance))
            .collect();
        let annotated = results.iter().filter(|r| r.actual.is_some()).count();
        let exact = results
            .iter()
            .filter(|r| r.actual.as_ref() == Some(&r.predicted) && r.error.is_none())
            .count();
        Report {
            results,
            annotated,
            exact,
        }
    }

    fn evaluate_instance(&self, instance: &Instance) -> InstanceResult {
        let (predicted, error) = match self.predict(&instance.shape) {
            Ok(predicted) => (predicted, None),
            Err(e) => {
                warn!(shape = %instance.shape, error = %e, "prediction failed");
                (Vec::new(), Some(e.to_string()))
            }
        };
        let actual = instance.is_annotated().then(|| {
            instance
                .segments
                .iter()
                .zip(&instance.labels)
                .map(|(text, label)| Segment::new(text.as_str(), label.as_str()))
                .collect()
        });
        InstanceResult {
            shape: instance.shape.clone(),
            predicted,
            actual,
            error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InstanceResult {
    pub shape: String,
    pub predicted: Vec<Segment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Vec<Segment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub results: Vec<InstanceResult>,
    pub annotated: usize,
    pub exact: usize,
}

impl Report {
    fn print(&self, title: &str) {
        println!("{title}");
        for result in &self.results {
            println!("Shape: {}", result.shape);
            let predicted = match &result.error {
                Some(e) => format!("Predicted: <{e}>"),
                None => format!("Predicted: {}", format_analysis(&result.predicted)),
            };
            match &result.actual {
                Some(actual) => println!("{predicted}\tActual: {}", format_analysis(actual)),
                None => println!("{predicted}"),
            }
        }
        if self.annotated > 0 {
            println!("Exact: {}/{}", self.exact, self.annotated);
        }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    train: &'a Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    test: Option<&'a Report>,
}

pub fn run(train_file: &str, test_file: Option<&str>, json: bool) {
    let train = die!(
        data::load_file(Path::new(train_file)),
        "Error reading {train_file}: {}"
    );
    let test = test_file.map(|file| {
        die!(
            data::load_file_unannotated(Path::new(file)),
            "Error reading {file}: {}"
        )
    });

    let pipeline = die!(Pipeline::train(settings(), &train), "Error training: {}");
    let train_report = pipeline.evaluate(&train);
    let test_report = test.as_deref().map(|instances| pipeline.evaluate(instances));

    if json {
        let output = JsonOutput {
            train: &train_report,
            test: test_report.as_ref(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output).expect("JSON serialization failed")
        );
        return;
    }

    train_report.print("Train results");
    if let Some(report) = &test_report {
        println!();
        report.print("Test results");
    }
}

#[cfg(test)]
mod tests {
    use morph_core::settings::{default_toml, parse_settings_toml};

    use super::*;

    const CORPUS: &str = "\
nikamik
ni kamik
1 boot

kamikka
kamik ka
boot PL

nimiss
ni miss
1 see

misska
miss ka
see PL
";

    fn direct_fit_settings() -> Settings {
        parse_settings_toml(&default_toml().replace("iterations = 50", "iterations = 0")).unwrap()
    }

    fn pipeline() -> (Pipeline, Vec<Instance>) {
        let instances = data::load_str(CORPUS).unwrap();
        (Pipeline::train(&direct_fit_settings(), &instances).unwrap(), instances)
    }

    #[test]
    fn predicts_training_words() {
        let (pipeline, instances) = pipeline();
        let report = pipeline.evaluate(&instances);
        assert_eq!(report.annotated, 4);
        assert_eq!(report.exact, 4);
        assert_eq!(
            format_analysis(&report.results[0].predicted),
            "ni/1-kamik/boot"
        );
    }

    #[test]
    fn predicts_unseen_combination() {
        let (pipeline, _) = pipeline();
        assert_eq!(
            pipeline.predict("nikamikka").unwrap(),
            vec![
                Segment::new("ni", "1"),
                Segment::new("kamik", "boot"),
                Segment::new("ka", "PL"),
            ]
        );
    }

    #[test]
    fn unannotated_instances_are_not_scored() {
        let (pipeline, _) = pipeline();
        let test = data::load_unannotated(["kamik"]).unwrap();
        let report = pipeline.evaluate(&test);
        assert_eq!(report.annotated, 0);
        assert_eq!(report.exact, 0);
        assert!(report.results[0].actual.is_none());
        assert_eq!(report.results[0].predicted, vec![Segment::new("kamik", "boot")]);
    }

    #[test]
    fn json_omits_missing_fields() {
        let (pipeline, _) = pipeline();
        let test = data::load_unannotated(["kamik"]).unwrap();
        let value = serde_json::to_value(pipeline.evaluate(&test)).unwrap();
        let result = &value["results"][0];
        assert_eq!(result["shape"], "kamik");
        assert_eq!(result["predicted"][0]["label"], "boot");
        assert!(result.get("actual").is_none());
        assert!(result.get("error").is_none());
    }

    #[test]
    fn default_settings_search_before_fitting() {
        let settings = parse_settings_toml(default_toml()).unwrap();
        let instances = data::load_str(CORPUS).unwrap();
        let pipeline = Pipeline::train(&settings, &instances).unwrap();

        let result = pipeline.labeller.search_result().unwrap();
        assert!((0.0..=1.0).contains(&result.score));
        assert_eq!(pipeline.labeller.params(), &result.params);
        let report = pipeline.evaluate(&instances);
        assert_eq!(report.annotated, 4);
        assert!(report.results.iter().all(|r| r.error.is_none()));
    }

    #[test]
    fn empty_corpus_fails_to_train() {
        let settings = parse_settings_toml(default_toml()).unwrap();
        assert!(Pipeline::train(&settings, &[]).is_err());
    }
}
