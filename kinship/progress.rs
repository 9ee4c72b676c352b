use crate::config::Strategy;
use crate::dosage::SkipReason;
use crate::types::VariantId;

/// Receives progress events from an accumulation.
///
/// `on_variant_skipped` may be called from worker threads (the batched strategy screens
/// variants inside its tasks); every other event comes from the thread driving the engine.
pub trait KinshipObserver: Send + Sync {
    fn on_begin(&self, strategy: Strategy, n_samples: usize, partitions: usize) {
        let _ = (strategy, n_samples, partitions);
    }
    fn on_variant_received(&self, variant: &VariantId, received: usize) {
        let _ = (variant, received);
    }
    fn on_variant_skipped(&self, variant: &VariantId, reason: SkipReason) {
        let _ = (variant, reason);
    }
    fn on_tasks_dispatched(&self, tasks: usize) {
        let _ = tasks;
    }
    fn on_finish(&self, variants_included: usize, variants_skipped: usize) {
        let _ = (variants_included, variants_skipped);
    }
}

#[derive(Default)]
pub struct NoopObserver;

impl KinshipObserver for NoopObserver {}

/// Forwards events to the `log` facade.
#[derive(Default)]
pub struct LogObserver;

impl KinshipObserver for LogObserver {
    fn on_begin(&self, strategy: Strategy, n_samples: usize, partitions: usize) {
        match strategy {
            Strategy::Batched => log::info!(
                "Accumulating kinship for {n_samples} samples using {partitions} batch slots"
            ),
            Strategy::Blockwise => log::info!(
                "Accumulating kinship for {n_samples} samples using {partitions} matrix blocks"
            ),
        }
    }

    fn on_variant_skipped(&self, variant: &VariantId, reason: SkipReason) {
        log::debug!("Skipping variant {variant}: {reason}");
    }

    fn on_finish(&self, variants_included: usize, variants_skipped: usize) {
        log::info!(
            "Kinship accumulation finished: {variants_included} variants included, {variants_skipped} skipped"
        );
    }
}
