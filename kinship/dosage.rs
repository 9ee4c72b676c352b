use crate::types::GenotypeProbabilityProvider;
use ndarray::Array1;
use std::fmt;

/// Hard-calls one sample: the first genotype whose probability reaches `threshold`.
#[inline]
pub fn call_genotype(probabilities: [f64; 3], threshold: f64) -> Option<u8> {
    (0u8..3).find(|&g| probabilities[usize::from(g)] >= threshold)
}

/// A variant ready for the rank update.
///
/// `dosage[i]` is `g_i - 2p` for called samples and zero otherwise; `present[i]` is one
/// for called samples and zero otherwise. The variance scale `1 / (2p(1-p))` is kept
/// separate and applied by the kernel.
#[derive(Clone, Debug, PartialEq)]
pub struct CentredVariant {
    pub dosage: Array1<f64>,
    pub present: Array1<f64>,
    pub scale: f64,
    pub allele_frequency: f64,
    pub called_samples: usize,
}

/// Why a variant contributes nothing to the accumulation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SkipReason {
    NoCalledSamples,
    LowFrequency { minor_allele_frequency: f64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCalledSamples => f.write_str("no sample passed the call threshold"),
            Self::LowFrequency {
                minor_allele_frequency,
            } => write!(f, "minor allele frequency {minor_allele_frequency:.4}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Screening {
    Included(CentredVariant),
    Skipped(SkipReason),
}

/// Thresholds, estimates the allele frequency, and centres one variant.
///
/// Variants with no called samples, or with minor allele frequency at or below
/// `frequency_floor`, are skipped.
pub fn centre_variant(
    genotypes: &dyn GenotypeProbabilityProvider,
    call_threshold: f64,
    frequency_floor: f64,
) -> Screening {
    let n = genotypes.number_of_samples();
    let mut dosage = Array1::<f64>::zeros(n);
    let mut present = Array1::<f64>::zeros(n);
    let mut allele_count = 0.0;
    let mut called_samples = 0usize;

    for sample in 0..n {
        if let Some(g) = call_genotype(genotypes.probabilities(sample), call_threshold) {
            let g = f64::from(g);
            dosage[sample] = g;
            present[sample] = 1.0;
            allele_count += g;
            called_samples += 1;
        }
    }

    if called_samples == 0 {
        return Screening::Skipped(SkipReason::NoCalledSamples);
    }

    let allele_frequency = allele_count / (2.0 * called_samples as f64);
    let minor_allele_frequency = allele_frequency.min(1.0 - allele_frequency);
    if minor_allele_frequency <= frequency_floor {
        return Screening::Skipped(SkipReason::LowFrequency {
            minor_allele_frequency,
        });
    }

    let twice_frequency = 2.0 * allele_frequency;
    dosage.zip_mut_with(&present, |d, &p| {
        if p > 0.0 {
            *d -= twice_frequency;
        }
    });

    Screening::Included(CentredVariant {
        dosage,
        present,
        scale: 1.0 / (2.0 * allele_frequency * (1.0 - allele_frequency)),
        allele_frequency,
        called_samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenotypeProbabilities;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn first_genotype_over_threshold_is_called() {
        assert_eq!(call_genotype([0.95, 0.05, 0.0], 0.9), Some(0));
        assert_eq!(call_genotype([0.05, 0.05, 0.9], 0.9), Some(2));
        assert_eq!(call_genotype([0.4, 0.4, 0.2], 0.9), None);
        assert_eq!(call_genotype([0.6, 0.6, 0.0], 0.5), Some(0));
    }

    #[test]
    fn three_sample_variant_is_centred_and_scaled() {
        let probs = GenotypeProbabilities::from_calls(&[Some(0), Some(1), Some(2)]);
        let Screening::Included(variant) = centre_variant(&probs, 0.9, 0.01) else {
            panic!("variant should be included");
        };
        assert_abs_diff_eq!(variant.allele_frequency, 0.5);
        assert_abs_diff_eq!(variant.scale, 2.0);
        assert_eq!(variant.dosage, array![-1.0, 0.0, 1.0]);
        assert_eq!(variant.present, array![1.0, 1.0, 1.0]);
    }

    #[test]
    fn missing_samples_contribute_zero() {
        let probs = GenotypeProbabilities::from_calls(&[Some(2), None, Some(0), Some(1)]);
        let Screening::Included(variant) = centre_variant(&probs, 0.9, 0.01) else {
            panic!("variant should be included");
        };
        assert_eq!(variant.called_samples, 3);
        assert_eq!(variant.dosage[1], 0.0);
        assert_eq!(variant.present, array![1.0, 0.0, 1.0, 1.0]);
        assert_abs_diff_eq!(variant.dosage.sum(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn frequency_at_the_floor_is_skipped() {
        let mut calls = vec![Some(0u8); 50];
        calls[0] = Some(1);
        let probs = GenotypeProbabilities::from_calls(&calls);
        assert_eq!(
            centre_variant(&probs, 0.9, 0.01),
            Screening::Skipped(SkipReason::LowFrequency {
                minor_allele_frequency: 0.01
            })
        );

        calls[1] = Some(1);
        let probs = GenotypeProbabilities::from_calls(&calls);
        assert!(matches!(
            centre_variant(&probs, 0.9, 0.01),
            Screening::Included(_)
        ));
    }

    #[test]
    fn minor_allele_is_whichever_is_rarer() {
        let probs = GenotypeProbabilities::from_calls(&[Some(2); 20]);
        assert_eq!(
            centre_variant(&probs, 0.9, 0.01),
            Screening::Skipped(SkipReason::LowFrequency {
                minor_allele_frequency: 0.0
            })
        );
    }

    #[test]
    fn uncalled_variant_is_skipped() {
        let probs = GenotypeProbabilities::from_calls(&[None, None]);
        assert_eq!(
            centre_variant(&probs, 0.9, 0.01),
            Screening::Skipped(SkipReason::NoCalledSamples)
        );
    }
}
