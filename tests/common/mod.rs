use kinship::{GenotypeProbabilities, GenotypeProbabilityProvider, VariantId};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Cohort {
    pub n_samples: usize,
    pub variants: Vec<(VariantId, GenotypeProbabilities)>,
}

/// A reproducible cohort mixing common variants, rare variants at or near the frequency
/// floor, uncertain genotypes, and fully missing samples.
pub fn random_cohort(seed: u64, n_samples: usize, n_variants: usize) -> Cohort {
    let mut rng = StdRng::seed_from_u64(seed);
    let variants = (0..n_variants)
        .map(|index| {
            let frequency = if index % 7 == 3 {
                rng.gen_range(0.0..0.02)
            } else {
                rng.gen_range(0.05..0.95)
            };
            let mut probabilities = Array2::<f64>::zeros((n_samples, 3));
            for mut row in probabilities.rows_mut() {
                let genotype =
                    usize::from(rng.gen_bool(frequency)) + usize::from(rng.gen_bool(frequency));
                let roll: f64 = rng.r#gen();
                if roll < 0.05 {
                    // Uncertain: no genotype reaches the call threshold.
                    row.fill(0.3);
                    row[genotype] = 0.4;
                } else if roll < 0.07 {
                    row.fill(0.0);
                } else {
                    row.fill(0.02);
                    row[genotype] = 0.96;
                }
            }
            let id = VariantId::new("1", index as u64 + 1, format!("rs{}", 1000 + index));
            let genotypes = GenotypeProbabilities::from_array(probabilities)
                .expect("three probability columns");
            (id, genotypes)
        })
        .collect();
    Cohort {
        n_samples,
        variants,
    }
}

/// Direct pairwise evaluation, written without any of the crate's accumulation code.
pub fn naive_kinship(
    cohort: &Cohort,
    call_threshold: f64,
    frequency_floor: f64,
) -> (Array2<f64>, Array2<f64>, usize) {
    let n = cohort.n_samples;
    let mut numerator = vec![vec![0.0f64; n]; n];
    let mut denominator = vec![vec![0.0f64; n]; n];
    let mut included = 0;

    for (_, genotypes) in &cohort.variants {
        let calls: Vec<Option<f64>> = (0..n)
            .map(|sample| {
                let probs = genotypes.probabilities(sample);
                probs
                    .iter()
                    .position(|&p| p >= call_threshold)
                    .map(|g| g as f64)
            })
            .collect();
        let called: Vec<f64> = calls.iter().flatten().copied().collect();
        if called.is_empty() {
            continue;
        }
        let p = called.iter().sum::<f64>() / (2.0 * called.len() as f64);
        if p.min(1.0 - p) <= frequency_floor {
            continue;
        }
        included += 1;
        for i in 0..n {
            for j in 0..n {
                if let (Some(gi), Some(gj)) = (calls[i], calls[j]) {
                    numerator[i][j] += (gi - 2.0 * p) * (gj - 2.0 * p) / (2.0 * p * (1.0 - p));
                    denominator[i][j] += 1.0;
                }
            }
        }
    }

    let kinship = Array2::from_shape_fn((n, n), |(i, j)| numerator[i][j] / denominator[i][j]);
    let counts = Array2::from_shape_fn((n, n), |(i, j)| denominator[i][j]);
    (kinship, counts, included)
}

pub fn assert_matrices_close(actual: &Array2<f64>, expected: &Array2<f64>, tolerance: f64) {
    assert_eq!(actual.dim(), expected.dim());
    for ((index, a), e) in actual.indexed_iter().zip(expected.iter()) {
        if e.is_nan() {
            assert!(a.is_nan(), "expected NaN at {index:?}, found {a}");
        } else {
            assert!(
                (a - e).abs() <= tolerance,
                "mismatch at {index:?}: {a} vs {e}"
            );
        }
    }
}
