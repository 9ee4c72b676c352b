use crate::batched::BatchedKinship;
use crate::blockwise::BlockwiseKinship;
use crate::config::{KinshipConfig, Strategy};
use crate::dosage::SkipReason;
use crate::error::KinshipError;
use crate::matrix::KinshipMatrix;
use crate::progress::KinshipObserver;
use crate::stream::VariantStream;
use crate::types::{GenotypeProbabilityProvider, VariantId};
use crate::worker::Worker;
use std::sync::Arc;

/// What happened to a variant handed to [`KinshipAccumulation::process_variant`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VariantDisposition {
    /// Buffered for a later batch task; screening happens inside that task.
    Queued,
    /// Screened and dispatched to every block.
    Included,
    Skipped(SkipReason),
}

/// A running accumulation: `begin`, any number of `process_variant`, then `end`.
///
/// Both strategies produce the same matrix up to floating-point summation order.
pub enum KinshipAccumulation {
    Batched(BatchedKinship),
    Blockwise(BlockwiseKinship),
}

impl KinshipAccumulation {
    pub fn begin(
        config: &KinshipConfig,
        worker: Arc<dyn Worker>,
        observer: Arc<dyn KinshipObserver>,
        n_samples: usize,
    ) -> Result<Self, KinshipError> {
        Ok(match config.strategy {
            Strategy::Batched => {
                Self::Batched(BatchedKinship::begin(config, worker, observer, n_samples)?)
            }
            Strategy::Blockwise => {
                Self::Blockwise(BlockwiseKinship::begin(config, worker, observer, n_samples)?)
            }
        })
    }

    pub fn n_samples(&self) -> usize {
        match self {
            Self::Batched(engine) => engine.n_samples(),
            Self::Blockwise(engine) => engine.n_samples(),
        }
    }

    pub fn process_variant(
        &mut self,
        id: &VariantId,
        genotypes: &dyn GenotypeProbabilityProvider,
    ) -> Result<VariantDisposition, KinshipError> {
        match self {
            Self::Batched(engine) => {
                engine.process_variant(id, genotypes)?;
                Ok(VariantDisposition::Queued)
            }
            Self::Blockwise(engine) => Ok(match engine.process_variant(id, genotypes)? {
                Some(reason) => VariantDisposition::Skipped(reason),
                None => VariantDisposition::Included,
            }),
        }
    }

    pub fn end(self) -> Result<KinshipMatrix, KinshipError> {
        match self {
            Self::Batched(engine) => engine.end(),
            Self::Blockwise(engine) => engine.end(),
        }
    }
}

/// Runs a whole stream through the configured strategy.
pub fn compute_kinship<S: VariantStream>(
    config: &KinshipConfig,
    worker: Arc<dyn Worker>,
    stream: &mut S,
    observer: Arc<dyn KinshipObserver>,
) -> Result<KinshipMatrix, KinshipError> {
    let mut accumulation =
        KinshipAccumulation::begin(config, worker, observer, stream.number_of_samples())?;
    while let Some((id, genotypes)) = stream
        .next_variant()
        .map_err(|err| KinshipError::Source(Box::new(err)))?
    {
        accumulation.process_variant(&id, &genotypes)?;
    }
    accumulation.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopObserver;
    use crate::stream::DenseVariantStream;
    use crate::worker::SynchronousWorker;
    use ndarray::Array2;

    #[test]
    fn dispositions_depend_on_strategy() {
        let probs = crate::types::GenotypeProbabilities::from_calls(&[Some(0), Some(1), Some(2)]);
        let id = VariantId::new("1", 10, "rs10");
        for (strategy, expected) in [
            (Strategy::Batched, VariantDisposition::Queued),
            (Strategy::Blockwise, VariantDisposition::Included),
        ] {
            let config = KinshipConfig {
                strategy,
                ..KinshipConfig::default()
            };
            let mut accumulation = KinshipAccumulation::begin(
                &config,
                Arc::new(SynchronousWorker::new()),
                Arc::new(NoopObserver),
                3,
            )
            .unwrap();
            assert_eq!(accumulation.n_samples(), 3);
            assert_eq!(accumulation.process_variant(&id, &probs).unwrap(), expected);
            assert_eq!(accumulation.end().unwrap().variants_included, 1);
        }
    }

    #[test]
    fn invalid_configuration_is_rejected_at_begin() {
        let config = KinshipConfig {
            batch_slots: 0,
            ..KinshipConfig::default()
        };
        let outcome = KinshipAccumulation::begin(
            &config,
            Arc::new(SynchronousWorker::new()),
            Arc::new(NoopObserver),
            3,
        );
        assert!(matches!(outcome, Err(KinshipError::Config(_))));
    }

    #[test]
    fn stream_driver_counts_every_variant() {
        let calls = Array2::from_shape_fn((12, 5), |(v, s)| Some(((v + s) % 3) as u8));
        let mut stream = DenseVariantStream::new(calls.view());
        let matrix = compute_kinship(
            &KinshipConfig::default(),
            Arc::new(SynchronousWorker::new()),
            &mut stream,
            Arc::new(NoopObserver),
        )
        .unwrap();
        assert_eq!(matrix.n_samples(), 5);
        assert_eq!(matrix.variants_included + matrix.variants_skipped, 12);
    }
}
