// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! End-to-end construction: raw shifts → (mask) → promotion → contraction.
//!
//! The contraction always realises the 9-point prescription. Any other
//! prescription is applied on the input, by zeroing (or reweighting) the
//! masked scale points of every raw shift, and on the output, through the
//! overall [`Prescription::normalization`].

use ndarray::{Array2, Array3};
use tracing::info;

use crate::axes::promote;
use crate::contract::thcovmat;
use crate::error::{CovmatError, Result};
use crate::prescription::Prescription;
use crate::sampler::ShiftSampler;

/// Multiplies the `(nf, nr)` slab of every point by the prescription mask.
pub fn apply_mask(raw: &[Array3<f64>], prescription: &Prescription) -> Result<Vec<Array3<f64>>> {
    let mask = prescription.mask();
    raw.iter()
        .map(|batch| {
            let (_, nf, nr) = batch.dim();
            if (nf, nr) != mask.dim() {
                return Err(CovmatError::MaskShape {
                    expected: [nf, nr],
                    found: [mask.nrows(), mask.ncols()],
                });
            }
            let mut masked = batch.clone();
            for mut slab in masked.outer_iter_mut() {
                slab *= mask;
            }
            Ok(masked)
        })
        .collect()
}

/// Unnormalised 9-point matrix of the given raw shifts.
pub fn build(raw: &[Array3<f64>]) -> Result<Array2<f64>> {
    let shifts = promote(raw)?;
    thcovmat(&shifts)
}

/// Matrix for `prescription`, masked and normalised.
pub fn build_with_prescription(
    raw: &[Array3<f64>],
    prescription: &Prescription,
) -> Result<Array2<f64>> {
    let normalization = prescription.checked_normalization()?;
    let masked = apply_mask(raw, prescription)?;
    let mut covmat = build(&masked)?;
    covmat *= normalization;
    info!(
        prescription = prescription.name().unwrap_or("custom"),
        normalization, "applied prescription"
    );
    Ok(covmat)
}

/// Samples pseudo-data for `sizes` and builds its unnormalised matrix.
pub fn from_sizes(sizes: &[usize], sampler: &mut ShiftSampler) -> Result<Array2<f64>> {
    let raw = sampler.sample(sizes);
    build(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ScaleGrid;
    use approx::assert_relative_eq;
    use ndarray::Array;

    #[test]
    fn masking_zeroes_excluded_scale_points() {
        let raw = vec![Array3::<f64>::ones((2, 3, 3))];
        let ren = Prescription::ren(ScaleGrid::default()).unwrap();
        let masked = apply_mask(&raw, &ren).unwrap();
        for slab in masked[0].outer_iter() {
            assert_eq!(slab, ren.mask().view());
        }
        assert_eq!(raw[0].sum(), 18.0);
    }

    #[test]
    fn mask_must_match_scale_grid() {
        let raw = vec![Array3::<f64>::ones((2, 3, 5))];
        let ren = Prescription::ren(ScaleGrid::default()).unwrap();
        assert_eq!(
            apply_mask(&raw, &ren).unwrap_err(),
            CovmatError::MaskShape {
                expected: [3, 5],
                found: [3, 3]
            }
        );
    }

    #[test]
    fn prescription_rescales_masked_matrix() {
        let raw = vec![
            Array::from_shape_fn((2, 3, 3), |(p, f, r)| (p + f + r) as f64),
            Array::from_shape_fn((3, 3, 3), |(p, f, r)| (p * f) as f64 - r as f64),
        ];
        let nine = Prescription::incoherent(ScaleGrid::default()).unwrap();
        let masked = build(&apply_mask(&raw, &nine).unwrap()).unwrap();
        let normalised = build_with_prescription(&raw, &nine).unwrap();
        for (got, base) in normalised.iter().zip(masked.iter()) {
            assert_relative_eq!(*got, base * nine.normalization(), epsilon = 1e-12);
        }
    }

    #[test]
    fn weightless_prescription_is_refused() {
        let raw = vec![Array3::<f64>::ones((2, 3, 3))];
        let empty = Prescription::custom(
            Array2::zeros((3, 3)),
            Some("nothing".to_string()),
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            build_with_prescription(&raw, &empty).unwrap_err(),
            CovmatError::EmptyMask {
                name: "nothing".to_string()
            }
        );
    }

    #[test]
    fn sampled_pipeline_produces_square_matrix() {
        let mut sampler = ShiftSampler::seeded(ScaleGrid::default(), 17);
        let covmat = from_sizes(&[4, 1, 3], &mut sampler).unwrap();
        assert_eq!(covmat.dim(), (8, 8));
    }
}
