//! Sequencer configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EncounterError, Result};
use crate::graph::ValidationConfig;

/// Tuning for a sequencer run, loadable from TOML.
///
/// ```toml
/// step_limit = 500
/// rng_seed = 42
///
/// [validation]
/// reject_closed_cycles = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Most nodes visited while handling one input before the run fails.
    pub step_limit: usize,
    /// Seed for the run's random number generator; entropy when absent.
    pub rng_seed: Option<u64>,
    pub validation: ValidationConfig,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            step_limit: 10_000,
            rng_seed: None,
            validation: ValidationConfig::default(),
        }
    }
}

impl SequencerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EncounterError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EncounterError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }
}
