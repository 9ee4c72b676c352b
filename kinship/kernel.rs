use crate::dosage::CentredVariant;
use crate::types::BlockExtent;
use ndarray::linalg::general_mat_mul;
use ndarray::{Array2, Axis, Zip, s};
use serde::{Deserialize, Serialize};

/// The pair of matrices every task accumulates into.
///
/// Both matrices cover one [`BlockExtent`]; element `(r, c)` corresponds to output row
/// `extent.x + r` and column `extent.y + c`.
#[derive(Clone, Debug, PartialEq)]
pub struct Accumulator {
    pub result: Array2<f64>,
    pub non_missing_count: Array2<f64>,
}

impl Accumulator {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            result: Array2::zeros((rows, cols)),
            non_missing_count: Array2::zeros((rows, cols)),
        }
    }

    pub fn for_extent(extent: &BlockExtent) -> Self {
        Self::zeros(extent.height(), extent.width())
    }

    /// Elementwise `self += other`. Shapes must match.
    pub fn merge(&mut self, other: &Accumulator) {
        Zip::from(&mut self.result)
            .and(&other.result)
            .par_for_each(|a, &b| *a += b);
        Zip::from(&mut self.non_missing_count)
            .and(&other.non_missing_count)
            .par_for_each(|a, &b| *a += b);
    }
}

/// Implementation of the rank-one update
/// `result += scale * dosage[rows] (x) dosage[cols]` and
/// `non_missing_count += present[rows] (x) present[cols]`.
///
/// Both kernels agree up to floating-point summation order on the lower triangle. Only
/// the lower triangle of a diagonal block is guaranteed to be written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RankUpdateKernel {
    /// Matrix-multiply based; uses cblas `dgemm` when built with the `blas` feature.
    #[default]
    Blas,
    /// Row-by-row scaled additions, touching only the lower triangle of diagonal blocks.
    Generic,
}

impl RankUpdateKernel {
    pub fn accumulate(self, target: &mut Accumulator, variant: &CentredVariant, extent: &BlockExtent) {
        debug_assert_eq!(target.result.dim(), (extent.height(), extent.width()));
        match self {
            Self::Blas => blas_update(target, variant, extent),
            Self::Generic => generic_update(target, variant, extent),
        }
    }
}

fn blas_update(target: &mut Accumulator, variant: &CentredVariant, extent: &BlockExtent) {
    let dosage_rows = variant.dosage.slice(s![extent.rows()]).insert_axis(Axis(1));
    let dosage_cols = variant.dosage.slice(s![extent.cols()]).insert_axis(Axis(0));
    general_mat_mul(
        variant.scale,
        &dosage_rows,
        &dosage_cols,
        1.0,
        &mut target.result,
    );

    let present_rows = variant.present.slice(s![extent.rows()]).insert_axis(Axis(1));
    let present_cols = variant.present.slice(s![extent.cols()]).insert_axis(Axis(0));
    general_mat_mul(
        1.0,
        &present_rows,
        &present_cols,
        1.0,
        &mut target.non_missing_count,
    );
}

fn generic_update(target: &mut Accumulator, variant: &CentredVariant, extent: &BlockExtent) {
    let dosage_cols = variant.dosage.slice(s![extent.cols()]);
    let present_cols = variant.present.slice(s![extent.cols()]);
    let width = extent.width();
    let diagonal = extent.is_diagonal();

    for (local_row, row) in extent.rows().enumerate() {
        let span = if diagonal {
            (local_row + 1).min(width)
        } else {
            width
        };

        let d = variant.dosage[row];
        if d != 0.0 {
            target
                .result
                .row_mut(local_row)
                .slice_mut(s![..span])
                .scaled_add(variant.scale * d, &dosage_cols.slice(s![..span]));
        }

        let p = variant.present[row];
        if p != 0.0 {
            target
                .non_missing_count
                .row_mut(local_row)
                .slice_mut(s![..span])
                .scaled_add(p, &present_cols.slice(s![..span]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, array};

    fn variant() -> CentredVariant {
        CentredVariant {
            dosage: array![-0.8, 0.0, 1.2, 0.2, -0.8, 0.2],
            present: array![1.0, 0.0, 1.0, 1.0, 1.0, 1.0],
            scale: 1.0 / (2.0 * 0.4 * 0.6),
            allele_frequency: 0.4,
            called_samples: 5,
        }
    }

    fn lower_triangle_matches(a: &Array2<f64>, b: &Array2<f64>, extent: &BlockExtent) {
        for (r, row) in extent.rows().enumerate() {
            for (c, col) in extent.cols().enumerate() {
                if col <= row {
                    assert_abs_diff_eq!(a[[r, c]], b[[r, c]], epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn kernels_agree_on_diagonal_blocks() {
        let variant = variant();
        let extent = BlockExtent::new(0, 0, 6, 6);
        let mut blas = Accumulator::for_extent(&extent);
        let mut generic = Accumulator::for_extent(&extent);
        RankUpdateKernel::Blas.accumulate(&mut blas, &variant, &extent);
        RankUpdateKernel::Generic.accumulate(&mut generic, &variant, &extent);

        lower_triangle_matches(&blas.result, &generic.result, &extent);
        lower_triangle_matches(&blas.non_missing_count, &generic.non_missing_count, &extent);
        assert_abs_diff_eq!(blas.result[[2, 0]], -0.8 * 1.2 * variant.scale, epsilon = 1e-12);
        assert_eq!(generic.result[[0, 2]], 0.0);
        assert_eq!(generic.non_missing_count[[1, 1]], 0.0);
        assert_eq!(generic.non_missing_count[[3, 2]], 1.0);
    }

    #[test]
    fn kernels_agree_on_off_diagonal_blocks() {
        let variant = variant();
        let extent = BlockExtent::new(3, 0, 6, 3);
        let mut blas = Accumulator::for_extent(&extent);
        let mut generic = Accumulator::for_extent(&extent);
        RankUpdateKernel::Blas.accumulate(&mut blas, &variant, &extent);
        RankUpdateKernel::Generic.accumulate(&mut generic, &variant, &extent);

        for (a, b) in blas.result.iter().zip(generic.result.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
        assert_eq!(blas.non_missing_count, generic.non_missing_count);
        assert_eq!(blas.non_missing_count.column(1), Array1::<f64>::zeros(3));
    }

    #[test]
    fn merge_adds_elementwise() {
        let mut a = Accumulator::zeros(2, 2);
        a.result.fill(1.0);
        let mut b = Accumulator::zeros(2, 2);
        b.result.fill(2.5);
        b.non_missing_count.fill(3.0);
        a.merge(&b);
        assert_eq!(a.result, Array2::from_elem((2, 2), 3.5));
        assert_eq!(a.non_missing_count, Array2::from_elem((2, 2), 3.0));
    }
}
