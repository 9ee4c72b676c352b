use crate::kernel::RankUpdateKernel;
use crate::worker::{WorkerConfig, WorkerKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("{0}")]
    Invalid(String),
}

/// How the accumulation is decomposed into tasks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Batches of variants, each accumulated into a private full matrix.
    #[default]
    Batched,
    /// Blocks of the output matrix, each updated by its own task per variant.
    Blockwise,
}

/// Engine configuration. Every field has a default, so an empty TOML document is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KinshipConfig {
    pub strategy: Strategy,
    pub kernel: RankUpdateKernel,
    /// A genotype is called when its probability is at least this value.
    pub call_threshold: f64,
    /// Variants whose minor allele frequency is at or below this value are skipped.
    pub frequency_floor: f64,
    pub batch_slots: usize,
    pub batch_size: usize,
    /// Step between consecutive batch slots; must be coprime to `batch_slots`.
    pub slot_stride: usize,
    /// Requested number of blocks for the blockwise strategy. Defaults to `max(N / 50, 1)`.
    pub block_target: Option<usize>,
    pub worker: WorkerConfig,
}

impl Default for KinshipConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            kernel: RankUpdateKernel::default(),
            call_threshold: 0.9,
            frequency_floor: 0.01,
            batch_slots: 7,
            batch_size: 10,
            slot_stride: 3,
            block_target: None,
            worker: WorkerConfig::default(),
        }
    }
}

impl KinshipConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        Self::from_toml_str(&toml_string)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.call_threshold > 0.0 && self.call_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "call_threshold must lie in (0, 1], got {}",
                self.call_threshold
            )));
        }
        if !(self.frequency_floor >= 0.0 && self.frequency_floor < 0.5) {
            return Err(ConfigError::Invalid(format!(
                "frequency_floor must lie in [0, 0.5), got {}",
                self.frequency_floor
            )));
        }
        if self.batch_slots == 0 {
            return Err(ConfigError::Invalid("batch_slots must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if gcd(self.slot_stride, self.batch_slots) != 1 {
            return Err(ConfigError::Invalid(format!(
                "slot_stride {} is not coprime to batch_slots {}",
                self.slot_stride, self.batch_slots
            )));
        }
        if self.block_target == Some(0) {
            return Err(ConfigError::Invalid("block_target must be at least 1".into()));
        }
        if self.worker.kind == WorkerKind::Queued
            && self.worker.threads > 0
            && self.worker.queue_capacity == 0
        {
            return Err(ConfigError::Invalid(
                "worker.queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Number of blocks the blockwise strategy aims for with `n_samples` samples.
    pub fn block_target_for(&self, n_samples: usize) -> usize {
        self.block_target.unwrap_or((n_samples / 50).max(1))
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}
