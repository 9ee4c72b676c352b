use ndarray::{Array1, Array2, Zip, s};
use std::fmt;

/// The finished, symmetric kinship matrix handed to downstream consumers.
#[derive(Clone, Debug)]
pub struct KinshipMatrix {
    /// `result / non_missing_count`, elementwise. Pairs that were never jointly called
    /// hold `NaN`.
    pub kinship: Array2<f64>,
    pub non_missing_count: Array2<f64>,
    pub variants_included: usize,
    pub variants_skipped: usize,
}

impl KinshipMatrix {
    /// Builds the final matrix from accumulators whose lower triangle is authoritative.
    pub(crate) fn from_lower_triangle(
        mut result: Array2<f64>,
        mut non_missing_count: Array2<f64>,
        variants_included: usize,
        variants_skipped: usize,
    ) -> Self {
        mirror_lower_to_upper(&mut result);
        mirror_lower_to_upper(&mut non_missing_count);
        Zip::from(&mut result)
            .and(&non_missing_count)
            .par_for_each(|value, &count| *value /= count);
        Self {
            kinship: result,
            non_missing_count,
            variants_included,
            variants_skipped,
        }
    }

    pub fn n_samples(&self) -> usize {
        self.kinship.nrows()
    }

    /// Provenance text attached to stored outputs.
    pub fn description(&self) -> String {
        format!(
            "Number of SNPs: {}\nNumber of samples: {}",
            self.variants_included,
            self.n_samples()
        )
    }

    /// Distribution of the finite coefficients.
    pub fn summary(&self) -> KinshipSummary {
        let n = self.n_samples();
        let mut off_diagonal = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for row in 1..n {
            off_diagonal.extend(
                self.kinship
                    .row(row)
                    .slice(s![..row])
                    .iter()
                    .copied()
                    .filter(|value| value.is_finite()),
            );
        }
        let off_diagonal = Array1::from(off_diagonal);
        let diagonal: Array1<f64> = self
            .kinship
            .diag()
            .iter()
            .copied()
            .filter(|value| value.is_finite())
            .collect();

        KinshipSummary {
            pairs: off_diagonal.len(),
            mean_off_diagonal: off_diagonal.mean().unwrap_or(f64::NAN),
            sd_off_diagonal: if off_diagonal.len() < 2 {
                f64::NAN
            } else {
                off_diagonal.std(1.0)
            },
            min_off_diagonal: off_diagonal.fold(f64::NAN, |low, &value| low.min(value)),
            max_off_diagonal: off_diagonal.fold(f64::NAN, |high, &value| high.max(value)),
            mean_diagonal: diagonal.mean().unwrap_or(f64::NAN),
        }
    }
}

/// Off-diagonal statistics are over distinct sample pairs (`i > j`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KinshipSummary {
    pub pairs: usize,
    pub mean_off_diagonal: f64,
    pub sd_off_diagonal: f64,
    pub min_off_diagonal: f64,
    pub max_off_diagonal: f64,
    pub mean_diagonal: f64,
}

impl fmt::Display for KinshipSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pairs, off-diagonal mean {:.6} (sd {:.6}, range {:.6} to {:.6}), mean diagonal {:.6}",
            self.pairs,
            self.mean_off_diagonal,
            self.sd_off_diagonal,
            self.min_off_diagonal,
            self.max_off_diagonal,
            self.mean_diagonal
        )
    }
}

pub(crate) fn mirror_lower_to_upper(matrix: &mut Array2<f64>) {
    let n = matrix.nrows();
    for row in 1..n {
        for col in 0..row {
            matrix[[col, row]] = matrix[[row, col]];
        }
    }
}
