use crate::config::ConfigError;
use crate::worker::{TaskError, WorkerError};
use thiserror::Error;

/// Errors raised by the kinship engines and the stream driver.
#[derive(Error, Debug)]
pub enum KinshipError {
    #[error("Variant has {actual} samples but the accumulation was started for {expected}.")]
    SampleCountMismatch { expected: usize, actual: usize },

    #[error("Genotype probability matrix must have 3 columns, found {columns}.")]
    InvalidProbabilities { columns: usize },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A slot lost its accumulator because the task holding it failed earlier.
    #[error("Task slot {slot} has no accumulator; an earlier task on this slot failed.")]
    SlotUnavailable { slot: usize },

    #[error("An accumulation task failed: {0}")]
    Task(#[from] TaskError),

    #[error("The worker could not accept a task: {0}")]
    Worker(#[from] WorkerError),

    #[error("Reading the variant stream failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}
