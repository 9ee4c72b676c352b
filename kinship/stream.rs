use crate::types::{GenotypeProbabilities, VariantId};
use ndarray::ArrayView2;
use std::convert::Infallible;

/// A source of variants for [`crate::compute_kinship`].
pub trait VariantStream {
    type Error: std::error::Error + Send + Sync + 'static;

    fn number_of_samples(&self) -> usize;

    /// Total variant count when known up front; used only for progress reporting.
    fn number_of_variants(&self) -> Option<usize> {
        None
    }

    fn reset(&mut self) -> Result<(), Self::Error>;

    fn next_variant(&mut self) -> Result<Option<(VariantId, GenotypeProbabilities)>, Self::Error>;
}

/// Streams hard calls held in memory, one row per variant.
pub struct DenseVariantStream<'a> {
    calls: ArrayView2<'a, Option<u8>>,
    chromosome: String,
    cursor: usize,
}

impl<'a> DenseVariantStream<'a> {
    /// `calls` is `variants x samples`. Variants are named `<chromosome>:<index + 1>`.
    pub fn new(calls: ArrayView2<'a, Option<u8>>) -> Self {
        Self {
            calls,
            chromosome: "1".to_string(),
            cursor: 0,
        }
    }

    pub fn with_chromosome(mut self, chromosome: impl Into<String>) -> Self {
        self.chromosome = chromosome.into();
        self
    }
}

impl VariantStream for DenseVariantStream<'_> {
    type Error = Infallible;

    fn number_of_samples(&self) -> usize {
        self.calls.ncols()
    }

    fn number_of_variants(&self) -> Option<usize> {
        Some(self.calls.nrows())
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.cursor = 0;
        Ok(())
    }

    fn next_variant(&mut self) -> Result<Option<(VariantId, GenotypeProbabilities)>, Self::Error> {
        if self.cursor >= self.calls.nrows() {
            return Ok(None);
        }
        let index = self.cursor;
        self.cursor += 1;
        let row: Vec<Option<u8>> = self.calls.row(index).to_vec();
        let position = index as u64 + 1;
        let id = VariantId::new(
            self.chromosome.clone(),
            position,
            format!("{}:{position}", self.chromosome),
        );
        Ok(Some((id, GenotypeProbabilities::from_calls(&row))))
    }
}
