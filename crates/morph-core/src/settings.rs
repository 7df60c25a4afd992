//! Global settings loaded from TOML.
//!
//! - `init_custom(toml_content)` sets a custom TOML before first `settings()` call
//! - `settings()` returns `&'static Settings` (lazy-init singleton)
//! - Default values are embedded via `include_str!("default_settings.toml")`

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::levenshtein::DIRECTIVE_MARKER;
use crate::segmentation::features::{LabelMode, LABEL_DELIMITER};

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Set custom TOML before first `settings()` call.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Get or initialize the global settings singleton.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let toml_str = CUSTOM_TOML
            .get()
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_SETTINGS_TOML);
        parse_settings_toml(toml_str).expect("settings TOML must be valid")
    })
}

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub featurizer: FeaturizerSettings,
    pub search: SearchSettings,
    pub labeller: LabellerSettings,
}

/// The `[featurizer]` section; also stored with saved models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturizerSettings {
    pub mode: LabelMode,
    pub inside_label: String,
    pub pad_token: String,
    pub token_pattern: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    pub max_candidates: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabellerSettings {
    pub ngrams: usize,
    pub c1: f64,
    pub c2: f64,
    pub max_iterations: usize,
    pub search: LabellerSearchSettings,
}

/// The `[labeller.search]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct LabellerSearchSettings {
    pub iterations: usize,
    pub folds: usize,
    pub c1_scale: f64,
    pub c2_scale: f64,
    pub seed: u64,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn invalid(field: &str, reason: impl Into<String>) -> SettingsError {
    SettingsError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Checks a featurizer section on its own, for settings that arrive with a
/// saved model rather than through a TOML file.
pub fn validate_featurizer(f: &FeaturizerSettings) -> Result<(), SettingsError> {
    macro_rules! check_label {
        ($field:ident) => {
            let value = &f.$field;
            let field = concat!("featurizer.", stringify!($field));
            if value.is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
            if value.contains(LABEL_DELIMITER) || value.contains(DIRECTIVE_MARKER) {
                return Err(invalid(
                    field,
                    format!("must not contain '{LABEL_DELIMITER}' or '{DIRECTIVE_MARKER}'"),
                ));
            }
        };
    }

    check_label!(inside_label);
    check_label!(pad_token);
    if f.inside_label == f.pad_token {
        return Err(invalid("featurizer.pad_token", "must differ from inside_label"));
    }

    if let Some(pattern) = &f.token_pattern {
        let regex = Regex::new(pattern)
            .map_err(|e| invalid("featurizer.token_pattern", e.to_string()))?;
        if regex.is_match("") {
            return Err(invalid("featurizer.token_pattern", "must not match the empty string"));
        }
    }
    Ok(())
}

fn check_non_negative(field: &str, value: f64) -> Result<(), SettingsError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(field, "must be non-negative"));
    }
    Ok(())
}

fn check_scale(field: &str, value: f64) -> Result<(), SettingsError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(field, "must be positive"));
    }
    Ok(())
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_positive_usize {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        };
    }

    validate_featurizer(&s.featurizer)?;

    check_positive_usize!(labeller.ngrams);
    check_positive_usize!(labeller.max_iterations);
    let l = &s.labeller;
    check_non_negative("labeller.c1", l.c1)?;
    check_non_negative("labeller.c2", l.c2)?;
    check_scale("labeller.search.c1_scale", l.search.c1_scale)?;
    check_scale("labeller.search.c2_scale", l.search.c2_scale)?;
    if s.labeller.search.iterations > 0 && s.labeller.search.folds < 2 {
        return Err(invalid("labeller.search.folds", "must be at least 2"));
    }

    // search.max_candidates of 0 means unbounded

    Ok(())
}
