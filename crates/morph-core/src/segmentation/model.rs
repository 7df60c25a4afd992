//! Saved segmenter models (MSEG format).
//!
//! Layout: 4-byte magic `MSEG`, 1-byte version, little-endian CRC32 of the
//! body, then the body: bincode-encoded featurizer settings and trained
//! classifier.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classification::NaiveBayesClassifier;
use super::features::{FeaturizationError, Featurizer};
use super::segmenter::ConstraintSegmenter;
use crate::settings::{validate_featurizer, FeaturizerSettings, SettingsError};

pub const MAGIC: &[u8; 4] = b"MSEG";
pub const VERSION: u8 = 1;
const HEADER_LEN: usize = 9;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header (too short)")]
    InvalidHeader,

    #[error("invalid magic bytes (expected MSEG)")]
    InvalidMagic,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("checksum mismatch (expected {expected:#010x}, got {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("serialization error: {0}")]
    Serialize(bincode::Error),

    #[error("deserialization error: {0}")]
    Deserialize(bincode::Error),

    #[error("invalid featurizer settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("cannot rebuild featurizer: {0}")]
    Featurizer(#[from] FeaturizationError),

    #[error("the segmenter has not been trained")]
    NotTrained,
}

/// Everything needed to rebuild a trained segmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterModel {
    pub featurizer: FeaturizerSettings,
    pub classifier: NaiveBayesClassifier,
}

impl SegmenterModel {
    pub fn from_segmenter(
        segmenter: &ConstraintSegmenter<NaiveBayesClassifier>,
    ) -> Result<Self, ModelError> {
        let classifier = segmenter.classifier().ok_or(ModelError::NotTrained)?;
        Ok(Self {
            featurizer: segmenter.featurizer().to_settings(),
            classifier: classifier.clone(),
        })
    }

    /// A trained segmenter with the default search strategy.
    pub fn into_segmenter(self) -> Result<ConstraintSegmenter<NaiveBayesClassifier>, ModelError> {
        validate_featurizer(&self.featurizer)?;
        let featurizer = Featurizer::from_settings(&self.featurizer)?;
        Ok(ConstraintSegmenter::from_classifier(featurizer, self.classifier))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        let body = bincode::serialize(self).map_err(ModelError::Serialize)?;
        let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        if bytes.len() < HEADER_LEN {
            return Err(ModelError::InvalidHeader);
        }
        if &bytes[0..4] != MAGIC {
            return Err(ModelError::InvalidMagic);
        }
        if bytes[4] != VERSION {
            return Err(ModelError::UnsupportedVersion(bytes[4]));
        }
        let expected = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        let body = &bytes[HEADER_LEN..];
        let actual = crc32fast::hash(body);
        if actual != expected {
            return Err(ModelError::ChecksumMismatch { expected, actual });
        }
        bincode::deserialize(body).map_err(ModelError::Deserialize)
    }

    /// Atomic write: write to .tmp then rename.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let bytes = self.to_bytes()?;
        let tmp = path.with_extension("tmp");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "model saved");
        Ok(())
    }

    pub fn open(path: &Path) -> Result<Self, ModelError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}
