//! Run configuration.
//!
//! A [`MatchConfig`] is read once, optionally from a YAML file, then
//! overridden from the command line and validated before the first document
//! is processed.
//!
//! ```yaml
//! threshold: 0.9
//! normalize:
//!   case: insensitive
//!   punctuation: ignore
//! max_alignment_work: 50000000
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::license_detection::align::{AlignOptions, DEFAULT_MAX_WORK};
use crate::license_detection::tokenize::NormalizeOptions;

/// Default minimum similarity for a reference or snippet to match.
pub const DEFAULT_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    /// Minimum similarity, in `(0, 1]`, for corpus references and bulk snippets.
    pub threshold: f64,
    pub normalize: NormalizeOptions,
    /// Posting visits allowed per alignment before the greedy fallback.
    pub max_alignment_work: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            normalize: NormalizeOptions::default(),
            max_alignment_work: DEFAULT_MAX_WORK,
        }
    }
}

impl MatchConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: MatchConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if self.max_alignment_work == 0 {
            return Err(ConfigError::ZeroWorkBudget);
        }
        Ok(())
    }

    pub fn align_options(&self) -> AlignOptions {
        AlignOptions {
            max_work: self.max_alignment_work,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license_detection::tokenize::{CasePolicy, PunctuationPolicy};
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = MatchConfig::default();
        assert_eq!(config.threshold, 0.9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        for threshold in [0.0, -0.5, 1.01, f64::NAN] {
            let config = MatchConfig {
                threshold,
                ..MatchConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))),
                "threshold {threshold} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let config = MatchConfig {
            max_alignment_work: 0,
            ..MatchConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroWorkBudget)));
    }

    #[test]
    fn test_from_yaml_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threshold: 0.75\nnormalize:\n  punctuation: keep").unwrap();

        let config = MatchConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.threshold, 0.75);
        assert_eq!(config.normalize.punctuation, PunctuationPolicy::Keep);
        assert_eq!(config.normalize.case, CasePolicy::Insensitive);
        assert_eq!(config.max_alignment_work, DEFAULT_MAX_WORK);
    }

    #[test]
    fn test_from_yaml_file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "treshold: 0.75").unwrap();
        assert!(MatchConfig::from_yaml_file(file.path()).is_err());
    }
}
