#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

#[cfg(feature = "blas")]
extern crate blas_src;

pub mod batched;
pub mod blockwise;
pub mod config;
pub mod dosage;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod matrix;
pub mod progress;
pub mod slot;
pub mod stream;
pub mod subdivide;
pub mod types;

#[path = "../worker/mod.rs"]
pub mod worker;

pub use config::{ConfigError, KinshipConfig, Strategy};
pub use engine::{KinshipAccumulation, VariantDisposition, compute_kinship};
pub use error::KinshipError;
pub use kernel::RankUpdateKernel;
pub use matrix::{KinshipMatrix, KinshipSummary};
pub use progress::{KinshipObserver, LogObserver, NoopObserver};
pub use stream::{DenseVariantStream, VariantStream};
pub use subdivide::subdivide_lower_triangle;
pub use types::{BlockExtent, GenotypeProbabilities, GenotypeProbabilityProvider, VariantId};
pub use worker::{Worker, WorkerConfig, WorkerKind};
