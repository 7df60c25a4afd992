//! Linear-chain CRF tagger trained with L-BFGS.

use std::fs;

use crfs::train::Trainer;
use crfs::{Attribute, Model};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use super::{check_training_shapes, LabellingError, SequenceModel};

pub const DEFAULT_C1: f64 = 0.1;
pub const DEFAULT_C2: f64 = 0.1;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// L1 (`c1`) and L2 (`c2`) regularization plus the L-BFGS iteration cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrfParams {
    pub c1: f64,
    pub c2: f64,
    pub max_iterations: usize,
}

impl Default for CrfParams {
    fn default() -> Self {
        Self {
            c1: DEFAULT_C1,
            c2: DEFAULT_C2,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

fn attributes(sequence: &[Vec<String>]) -> Vec<Vec<Attribute>> {
    sequence
        .iter()
        .map(|item| item.iter().map(|name| Attribute::new(name.as_str(), 1.0)).collect())
        .collect()
}

/// A trained CRF, held as the serialized CRFsuite model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrfTagger {
    params: CrfParams,
    model: Vec<u8>,
}

impl CrfTagger {
    pub fn params(&self) -> &CrfParams {
        &self.params
    }

    /// The model in CRFsuite's binary format.
    pub fn model_bytes(&self) -> &[u8] {
        &self.model
    }
}

impl SequenceModel for CrfTagger {
    fn fit(
        sequences: &[Vec<Vec<String>>],
        labels: &[Vec<String>],
        params: &CrfParams,
    ) -> Result<Self, LabellingError> {
        check_training_shapes(sequences, labels)?;
        let _span = debug_span!(
            "crf_fit",
            sequences = sequences.len(),
            c1 = params.c1,
            c2 = params.c2
        )
        .entered();

        let mut trainer = Trainer::lbfgs();
        trainer.verbose(false);
        trainer.params_mut().set_c1(params.c1)?;
        trainer.params_mut().set_c2(params.c2)?;
        trainer.params_mut().set_max_iterations(params.max_iterations)?;
        for (sequence, labels) in sequences.iter().zip(labels) {
            let yseq: Vec<&str> = labels.iter().map(String::as_str).collect();
            trainer.append(&attributes(sequence), &yseq)?;
        }

        // The trainer only writes to a path
        let file = tempfile::NamedTempFile::new()?;
        trainer.train(file.path())?;
        let model = fs::read(file.path())?;
        Model::new(&model)?;
        debug!(bytes = model.len(), "crf trained");

        Ok(Self {
            params: *params,
            model,
        })
    }

    fn predict(&self, sequence: &[Vec<String>]) -> Result<Vec<String>, LabellingError> {
        let model = Model::new(&self.model)?;
        let tagger = model.tagger()?;
        let tags = tagger.tag(&attributes(sequence))?;
        Ok(tags.into_iter().map(str::to_string).collect())
    }
}
