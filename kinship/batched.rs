// ========================================================================================
//
//                    Batched replication: one private matrix per slot
//
// ========================================================================================
//
// The variant stream is cut into batches. Each batch is handed to one task together with
// the full `N x N` accumulator of the slot it was assigned to; the task screens and
// centres every variant in the batch and applies the rank update to that private
// accumulator. Slots are visited with a stride coprime to the slot count, so consecutive
// batches land on different slots and every slot is reused before any is revisited.
// At the end the slot accumulators are summed in slot order.

use crate::config::{KinshipConfig, Strategy};
use crate::dosage::{Screening, centre_variant};
use crate::error::KinshipError;
use crate::kernel::{Accumulator, RankUpdateKernel};
use crate::matrix::KinshipMatrix;
use crate::progress::KinshipObserver;
use crate::slot::TaskSlot;
use crate::types::{BlockExtent, GenotypeProbabilities, GenotypeProbabilityProvider, VariantId};
use crate::worker::Worker;
use std::mem;
use std::sync::Arc;

/// What travels through a slot: the private accumulator and its tallies.
struct SlotState {
    accumulator: Accumulator,
    included: usize,
    skipped: usize,
}

/// Everything a batch task needs, moved into the task.
struct BatchJob {
    variants: Vec<(VariantId, GenotypeProbabilities)>,
    kernel: RankUpdateKernel,
    call_threshold: f64,
    frequency_floor: f64,
    extent: BlockExtent,
    observer: Arc<dyn KinshipObserver>,
}

impl BatchJob {
    fn run(self, mut state: SlotState) -> SlotState {
        for (id, genotypes) in &self.variants {
            match centre_variant(genotypes, self.call_threshold, self.frequency_floor) {
                Screening::Included(variant) => {
                    self.kernel
                        .accumulate(&mut state.accumulator, &variant, &self.extent);
                    state.included += 1;
                }
                Screening::Skipped(reason) => {
                    self.observer.on_variant_skipped(id, reason);
                    state.skipped += 1;
                }
            }
        }
        state
    }
}

pub struct BatchedKinship {
    n_samples: usize,
    kernel: RankUpdateKernel,
    call_threshold: f64,
    frequency_floor: f64,
    batch_size: usize,
    slot_stride: usize,
    worker: Arc<dyn Worker>,
    observer: Arc<dyn KinshipObserver>,
    slots: Vec<TaskSlot<SlotState>>,
    current_slot: usize,
    pending: Vec<(VariantId, GenotypeProbabilities)>,
    received: usize,
}

impl BatchedKinship {
    /// Allocates one zeroed `N x N` accumulator pair per slot.
    pub fn begin(
        config: &KinshipConfig,
        worker: Arc<dyn Worker>,
        observer: Arc<dyn KinshipObserver>,
        n_samples: usize,
    ) -> Result<Self, KinshipError> {
        config.validate()?;
        let slots = (0..config.batch_slots)
            .map(|_| {
                TaskSlot::Idle(SlotState {
                    accumulator: Accumulator::zeros(n_samples, n_samples),
                    included: 0,
                    skipped: 0,
                })
            })
            .collect();
        observer.on_begin(Strategy::Batched, n_samples, config.batch_slots);
        Ok(Self {
            n_samples,
            kernel: config.kernel,
            call_threshold: config.call_threshold,
            frequency_floor: config.frequency_floor,
            batch_size: config.batch_size,
            slot_stride: config.slot_stride,
            worker,
            observer,
            slots,
            current_slot: 0,
            pending: Vec::with_capacity(config.batch_size),
            received: 0,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Copies the variant into the current batch, dispatching the batch once it is full.
    pub fn process_variant(
        &mut self,
        id: &VariantId,
        genotypes: &dyn GenotypeProbabilityProvider,
    ) -> Result<(), KinshipError> {
        let actual = genotypes.number_of_samples();
        if actual != self.n_samples {
            return Err(KinshipError::SampleCountMismatch {
                expected: self.n_samples,
                actual,
            });
        }
        self.received += 1;
        self.observer.on_variant_received(id, self.received);
        self.pending
            .push((id.clone(), GenotypeProbabilities::from_provider(genotypes)));
        if self.pending.len() >= self.batch_size {
            self.dispatch_pending()?;
        }
        Ok(())
    }

    fn dispatch_pending(&mut self) -> Result<(), KinshipError> {
        let variants = mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        let index = self.current_slot;
        let state = self.slots[index].reclaim(index)?;
        let job = BatchJob {
            variants,
            kernel: self.kernel,
            call_threshold: self.call_threshold,
            frequency_floor: self.frequency_floor,
            extent: BlockExtent::new(0, 0, self.n_samples, self.n_samples),
            observer: Arc::clone(&self.observer),
        };
        self.slots[index].dispatch(self.worker.as_ref(), move || job.run(state))?;
        self.observer.on_tasks_dispatched(1);
        self.current_slot = (self.current_slot + self.slot_stride) % self.slots.len();
        Ok(())
    }

    /// Flushes the partial batch, waits for every slot, and reduces in slot order.
    pub fn end(mut self) -> Result<KinshipMatrix, KinshipError> {
        if !self.pending.is_empty() {
            self.dispatch_pending()?;
        }
        let mut slots = mem::take(&mut self.slots);

        let mut total = slots[0].reclaim(0)?;
        for (index, slot) in slots.iter_mut().enumerate().skip(1) {
            let partial = slot.reclaim(index)?;
            total.accumulator.merge(&partial.accumulator);
            total.included += partial.included;
            total.skipped += partial.skipped;
        }

        self.observer.on_finish(total.included, total.skipped);
        Ok(KinshipMatrix::from_lower_triangle(
            total.accumulator.result,
            total.accumulator.non_missing_count,
            total.included,
            total.skipped,
        ))
    }
}

impl Drop for BatchedKinship {
    fn drop(&mut self) {
        for slot in &self.slots {
            slot.wait();
        }
    }
}
