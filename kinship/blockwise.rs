// ========================================================================================
//
//                  Blockwise streaming: one task per output block per variant
//
// ========================================================================================
//
// The lower triangle of the output is partitioned into non-overlapping blocks, each
// owning the accumulator for its own region. Every included variant is centred once on
// the engine thread and shared read-only with one task per block. A block's next task is
// only built after its previous task has finished and handed the accumulator back, so
// at most one task ever writes a given region.

use crate::config::{KinshipConfig, Strategy};
use crate::dosage::{Screening, SkipReason, centre_variant};
use crate::error::KinshipError;
use crate::kernel::{Accumulator, RankUpdateKernel};
use crate::matrix::KinshipMatrix;
use crate::progress::KinshipObserver;
use crate::slot::TaskSlot;
use crate::subdivide::subdivide_lower_triangle;
use crate::types::{BlockExtent, GenotypeProbabilityProvider, VariantId};
use crate::worker::Worker;
use ndarray::{Array2, s};
use std::mem;
use std::sync::Arc;

pub struct BlockwiseKinship {
    n_samples: usize,
    kernel: RankUpdateKernel,
    call_threshold: f64,
    frequency_floor: f64,
    worker: Arc<dyn Worker>,
    observer: Arc<dyn KinshipObserver>,
    blocks: Vec<BlockExtent>,
    slots: Vec<TaskSlot<Accumulator>>,
    received: usize,
    included: usize,
    skipped: usize,
}

impl BlockwiseKinship {
    pub fn begin(
        config: &KinshipConfig,
        worker: Arc<dyn Worker>,
        observer: Arc<dyn KinshipObserver>,
        n_samples: usize,
    ) -> Result<Self, KinshipError> {
        config.validate()?;
        let blocks = subdivide_lower_triangle(n_samples, config.block_target_for(n_samples));
        let slots = blocks
            .iter()
            .map(|extent| TaskSlot::Idle(Accumulator::for_extent(extent)))
            .collect();
        log::debug!(
            "Blockwise accumulation over {n_samples} samples split into {} blocks",
            blocks.len()
        );
        observer.on_begin(Strategy::Blockwise, n_samples, blocks.len());
        Ok(Self {
            n_samples,
            kernel: config.kernel,
            call_threshold: config.call_threshold,
            frequency_floor: config.frequency_floor,
            worker,
            observer,
            blocks,
            slots,
            received: 0,
            included: 0,
            skipped: 0,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn blocks(&self) -> &[BlockExtent] {
        &self.blocks
    }

    /// Screens the variant and, if it is included, dispatches one task per block.
    pub fn process_variant(
        &mut self,
        id: &VariantId,
        genotypes: &dyn GenotypeProbabilityProvider,
    ) -> Result<Option<SkipReason>, KinshipError> {
        let actual = genotypes.number_of_samples();
        if actual != self.n_samples {
            return Err(KinshipError::SampleCountMismatch {
                expected: self.n_samples,
                actual,
            });
        }
        self.received += 1;
        self.observer.on_variant_received(id, self.received);

        let variant = match centre_variant(genotypes, self.call_threshold, self.frequency_floor) {
            Screening::Included(variant) => Arc::new(variant),
            Screening::Skipped(reason) => {
                self.observer.on_variant_skipped(id, reason);
                self.skipped += 1;
                return Ok(Some(reason));
            }
        };

        for (index, extent) in self.blocks.iter().enumerate() {
            let mut accumulator = self.slots[index].reclaim(index)?;
            let variant = Arc::clone(&variant);
            let extent = *extent;
            let kernel = self.kernel;
            self.slots[index].dispatch(self.worker.as_ref(), move || {
                kernel.accumulate(&mut accumulator, &variant, &extent);
                accumulator
            })?;
        }
        self.observer.on_tasks_dispatched(self.blocks.len());
        self.included += 1;
        Ok(None)
    }

    /// Waits for every block, assembles the lower triangle, then mirrors and divides.
    pub fn end(mut self) -> Result<KinshipMatrix, KinshipError> {
        let n = self.n_samples;
        let mut result = Array2::<f64>::zeros((n, n));
        let mut non_missing_count = Array2::<f64>::zeros((n, n));

        let mut slots = mem::take(&mut self.slots);
        for (index, (slot, extent)) in slots.iter_mut().zip(&self.blocks).enumerate() {
            let block = slot.reclaim(index)?;
            result
                .slice_mut(s![extent.rows(), extent.cols()])
                .assign(&block.result);
            non_missing_count
                .slice_mut(s![extent.rows(), extent.cols()])
                .assign(&block.non_missing_count);
        }

        self.observer.on_finish(self.included, self.skipped);
        Ok(KinshipMatrix::from_lower_triangle(
            result,
            non_missing_count,
            self.included,
            self.skipped,
        ))
    }
}

impl Drop for BlockwiseKinship {
    fn drop(&mut self) {
        for slot in &self.slots {
            slot.wait();
        }
    }
}
