use crate::error::KinshipError;
use ndarray::{Array2, ArrayView2};
use std::fmt;
use std::ops::Range;

/// Identifies one variant in the stream. Only used for reporting.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VariantId {
    pub chromosome: String,
    pub position: u64,
    pub rsid: String,
}

impl VariantId {
    pub fn new(chromosome: impl Into<String>, position: u64, rsid: impl Into<String>) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
            rsid: rsid.into(),
        }
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.chromosome, self.position, self.rsid)
    }
}

/// Per-sample genotype probabilities for one variant, as supplied by the caller.
///
/// `probabilities(i)` returns `[P(g=0), P(g=1), P(g=2)]` for sample `i`, where `g` counts
/// copies of the second allele. Rows that sum to less than one are allowed; they simply
/// fail to reach the call threshold.
pub trait GenotypeProbabilityProvider {
    fn number_of_samples(&self) -> usize;

    fn probabilities(&self, sample: usize) -> [f64; 3];
}

/// An owned `N x 3` matrix of genotype probabilities.
#[derive(Clone, Debug, PartialEq)]
pub struct GenotypeProbabilities {
    values: Array2<f64>,
}

impl GenotypeProbabilities {
    pub fn from_array(values: Array2<f64>) -> Result<Self, KinshipError> {
        if values.ncols() != 3 {
            return Err(KinshipError::InvalidProbabilities {
                columns: values.ncols(),
            });
        }
        Ok(Self { values })
    }

    /// Certain calls: `Some(g)` becomes a one-hot row, `None` an all-zero row.
    /// Genotypes above 2 are treated as missing.
    pub fn from_calls(calls: &[Option<u8>]) -> Self {
        let mut values = Array2::<f64>::zeros((calls.len(), 3));
        for (sample, call) in calls.iter().enumerate() {
            if let Some(g) = call.filter(|g| *g <= 2) {
                values[[sample, usize::from(g)]] = 1.0;
            }
        }
        Self { values }
    }

    /// Copies any provider into owned storage.
    pub fn from_provider(provider: &dyn GenotypeProbabilityProvider) -> Self {
        let n = provider.number_of_samples();
        let mut values = Array2::<f64>::zeros((n, 3));
        for (sample, mut row) in values.rows_mut().into_iter().enumerate() {
            let probs = provider.probabilities(sample);
            for (dst, src) in row.iter_mut().zip(probs) {
                *dst = src;
            }
        }
        Self { values }
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }
}

impl GenotypeProbabilityProvider for GenotypeProbabilities {
    fn number_of_samples(&self) -> usize {
        self.values.nrows()
    }

    fn probabilities(&self, sample: usize) -> [f64; 3] {
        let row = self.values.row(sample);
        [row[0], row[1], row[2]]
    }
}

/// A rectangular region of the output matrix: rows `x..x_end`, columns `y..y_end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockExtent {
    pub x: usize,
    pub y: usize,
    pub x_end: usize,
    pub y_end: usize,
}

impl BlockExtent {
    pub fn new(x: usize, y: usize, x_end: usize, y_end: usize) -> Self {
        debug_assert!(x <= x_end && y <= y_end);
        Self { x, y, x_end, y_end }
    }

    #[inline]
    pub fn rows(&self) -> Range<usize> {
        self.x..self.x_end
    }

    #[inline]
    pub fn cols(&self) -> Range<usize> {
        self.y..self.y_end
    }

    pub fn height(&self) -> usize {
        self.x_end - self.x
    }

    pub fn width(&self) -> usize {
        self.y_end - self.y
    }

    /// Diagonal blocks straddle the main diagonal and only their lower part is meaningful.
    pub fn is_diagonal(&self) -> bool {
        self.x == self.y
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows().contains(&row) && self.cols().contains(&col)
    }
}

impl fmt::Display for BlockExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}-{}) x [{}-{})",
            self.x, self.x_end, self.y, self.y_end
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn calls_become_one_hot_rows() {
        let probs = GenotypeProbabilities::from_calls(&[Some(0), None, Some(2), Some(7)]);
        assert_eq!(probs.number_of_samples(), 4);
        assert_eq!(probs.probabilities(0), [1.0, 0.0, 0.0]);
        assert_eq!(probs.probabilities(1), [0.0, 0.0, 0.0]);
        assert_eq!(probs.probabilities(2), [0.0, 0.0, 1.0]);
        assert_eq!(probs.probabilities(3), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn arrays_must_have_three_columns() {
        let err = GenotypeProbabilities::from_array(array![[0.5, 0.5]]).unwrap_err();
        assert!(matches!(
            err,
            KinshipError::InvalidProbabilities { columns: 2 }
        ));
    }

    #[test]
    fn block_extent_ranges() {
        let block = BlockExtent::new(4, 0, 8, 4);
        assert_eq!(block.rows(), 4..8);
        assert_eq!(block.cols(), 0..4);
        assert!(!block.is_diagonal());
        assert!(block.contains(7, 3));
        assert!(!block.contains(3, 3));
        assert_eq!(block.to_string(), "[4-8) x [0-4)");
    }
}
