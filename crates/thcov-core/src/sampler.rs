// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Pseudo-data generator for theory shifts.
//!
//! Every process gets its own Gaussian signature: mean `10 k` and standard
//! deviation `k` for the zero-based process index `k`. Process 0 therefore
//! samples a constant `0` for every point.

use ndarray::Array3;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use thcov_config::determinism;
use tracing::debug;

use crate::error::{CovmatError, Result};
use crate::grid::ScaleGrid;

const SAMPLER_LABEL: &str = "thcov-core/sampler";

/// Per-process Gaussian parameters, linear in the process index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShiftSignature {
    pub mean_step: f64,
    pub std_step: f64,
}

impl Default for ShiftSignature {
    fn default() -> Self {
        Self {
            mean_step: 10.0,
            std_step: 1.0,
        }
    }
}

impl ShiftSignature {
    fn validate(&self) -> Result<()> {
        if !self.mean_step.is_finite() {
            return Err(CovmatError::Distribution(format!(
                "mean step must be finite, got {}",
                self.mean_step
            )));
        }
        if !(self.std_step >= 0.0) || !self.std_step.is_finite() {
            return Err(CovmatError::Distribution(format!(
                "standard deviation step must be finite and non-negative, got {}",
                self.std_step
            )));
        }
        Ok(())
    }

    /// `(mean, std)` of the distribution used for `process`.
    pub fn parameters(&self, process: usize) -> (f64, f64) {
        let k = process as f64;
        (self.mean_step * k, self.std_step * k)
    }
}

/// Draws raw shift batches shaped `(points, nf, nr)`.
#[derive(Debug)]
pub struct ShiftSampler {
    grid: ScaleGrid,
    signature: ShiftSignature,
    rng: StdRng,
}

impl ShiftSampler {
    pub fn new(grid: ScaleGrid, rng: StdRng) -> Self {
        Self {
            grid,
            signature: ShiftSignature::default(),
            rng,
        }
    }

    pub fn seeded(grid: ScaleGrid, seed: u64) -> Self {
        Self::from_config(grid, Some(seed))
    }

    /// Uses `seed` when given, otherwise the process-wide determinism settings.
    pub fn from_config(grid: ScaleGrid, seed: Option<u64>) -> Self {
        Self::new(grid, determinism::rng_from_optional(seed, SAMPLER_LABEL))
    }

    pub fn with_signature(mut self, signature: ShiftSignature) -> Result<Self> {
        signature.validate()?;
        self.signature = signature;
        Ok(self)
    }

    pub fn grid(&self) -> ScaleGrid {
        self.grid
    }

    /// One batch per entry of `sizes`, in order.
    pub fn sample(&mut self, sizes: &[usize]) -> Vec<Array3<f64>> {
        sizes
            .iter()
            .enumerate()
            .map(|(process, &points)| {
                let (mean, std) = self.signature.parameters(process);
                draw_batch(&mut self.rng, points, self.grid, mean, std)
            })
            .collect()
    }
}

/// Samples one batch per process with the default signature from a caller
/// owned generator.
pub fn raw_shifts<R: Rng + ?Sized>(
    sizes: &[usize],
    grid: ScaleGrid,
    rng: &mut R,
) -> Vec<Array3<f64>> {
    let signature = ShiftSignature::default();
    sizes
        .iter()
        .enumerate()
        .map(|(process, &points)| {
            let (mean, std) = signature.parameters(process);
            draw_batch(rng, points, grid, mean, std)
        })
        .collect()
}

fn draw_batch<R: Rng + ?Sized>(
    rng: &mut R,
    points: usize,
    grid: ScaleGrid,
    mean: f64,
    std: f64,
) -> Array3<f64> {
    debug!(points, nf = grid.nf, nr = grid.nr, mean, std, "sampling shift batch");
    Array3::from_shape_simple_fn((points, grid.nf, grid.nr), || {
        let z: f64 = StandardNormal.sample(rng);
        mean + std * z
    })
}
