// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Scale-variation prescriptions realised as masks over the `(nf, nr)` grid.
//!
//! The usual 3×3 prescriptions (3, 5, 7 and 9 points with their "b"/"c"
//! variants) generalise to larger and even non-square grids. Masks may carry
//! weights other than 0 and 1; the normalisations follow the weights.
//!
//! The central scale is always masked out. It never contributes anyway, the
//! shift at the central scale is null by definition.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::{s, Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{CovmatError, Result};
use crate::grid::ScaleGrid;

/// The named prescriptions, keyed as in the 3×3 literature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrescriptionKind {
    /// 3 point, renormalization scale only.
    Ren,
    /// 3 point, factorization scale only.
    Fact,
    /// 3 point, scales fully correlated.
    Sum,
    /// 3 point, scales fully anti-correlated.
    AntiSum,
    /// 5 point.
    Christ,
    /// 5 point, correlated.
    StAndrews,
    /// 7 point.
    Tridiag,
    /// 7 point, anti-correlated.
    AntiTridiag,
    /// 9 point.
    Incoherent,
}

impl PrescriptionKind {
    pub const ALL: [PrescriptionKind; 9] = [
        PrescriptionKind::Ren,
        PrescriptionKind::Fact,
        PrescriptionKind::Sum,
        PrescriptionKind::AntiSum,
        PrescriptionKind::Christ,
        PrescriptionKind::StAndrews,
        PrescriptionKind::Tridiag,
        PrescriptionKind::AntiTridiag,
        PrescriptionKind::Incoherent,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PrescriptionKind::Ren => "3",
            PrescriptionKind::Fact => "3b",
            PrescriptionKind::Sum => "3c",
            PrescriptionKind::AntiSum => "3cb",
            PrescriptionKind::Christ => "5",
            PrescriptionKind::StAndrews => "5b",
            PrescriptionKind::Tridiag => "7",
            PrescriptionKind::AntiTridiag => "7b",
            PrescriptionKind::Incoherent => "9",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PrescriptionKind::Ren => "Renormalization only",
            PrescriptionKind::Fact => "Factorization only",
            PrescriptionKind::Sum => "Fully correlated",
            PrescriptionKind::AntiSum => "Fully anti-correlated",
            PrescriptionKind::Christ => "Christ",
            PrescriptionKind::StAndrews => "St Andrews",
            PrescriptionKind::Tridiag => "Tridiagonal",
            PrescriptionKind::AntiTridiag => "Anti-tridiagonal",
            PrescriptionKind::Incoherent => "Fully incoherent",
        }
    }
}

impl fmt::Display for PrescriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PrescriptionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PrescriptionKind::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| format!("unknown prescription '{s}'"))
    }
}

/// A mask over the scale grid plus the position of the central scale.
#[derive(Clone, Debug, PartialEq)]
pub struct Prescription {
    mask: Array2<f64>,
    name: Option<String>,
    f0: usize,
    r0: usize,
}

impl Prescription {
    /// Wraps an arbitrary (possibly weighted) mask.
    ///
    /// The central scale defaults to the middle of each axis and is nullified.
    pub fn custom(
        mask: Array2<f64>,
        name: Option<String>,
        f0: Option<usize>,
        r0: Option<usize>,
    ) -> Result<Self> {
        let (nf, nr) = mask.dim();
        let f0 = f0.unwrap_or(nf / 2);
        let r0 = r0.unwrap_or(nr / 2);
        if f0 >= nf || r0 >= nr {
            return Err(CovmatError::CentralOutOfRange {
                f0,
                r0,
                shape: [nf, nr],
            });
        }
        let mut prescription = Self {
            mask,
            name,
            f0,
            r0,
        };
        prescription.nullify_central();
        Ok(prescription)
    }

    /// Builds the named prescription on `grid`.
    pub fn new(
        kind: PrescriptionKind,
        grid: ScaleGrid,
        f0: Option<usize>,
        r0: Option<usize>,
    ) -> Result<Self> {
        let mut prescription = Self::custom(
            Array2::zeros((grid.nf, grid.nr)),
            Some(kind.label().to_string()),
            f0,
            r0,
        )?;
        let (f0, r0) = prescription.central();
        let mask = &mut prescription.mask;
        match kind {
            PrescriptionKind::Ren => mask.row_mut(f0).fill(1.0),
            PrescriptionKind::Fact => mask.column_mut(r0).fill(1.0),
            PrescriptionKind::Sum => mask.diag_mut().fill(1.0),
            PrescriptionKind::AntiSum => mask.slice_mut(s![..;-1, ..]).diag_mut().fill(1.0),
            PrescriptionKind::Christ => {
                mask.row_mut(f0).fill(1.0);
                mask.column_mut(r0).fill(1.0);
            }
            PrescriptionKind::StAndrews => {
                mask.diag_mut().fill(1.0);
                mask.slice_mut(s![..;-1, ..]).diag_mut().fill(1.0);
            }
            PrescriptionKind::Tridiag => {
                mask.diag_mut().fill(1.0);
                mask.slice_mut(s![1.., ..]).diag_mut().fill(1.0);
                mask.slice_mut(s![.., 1..]).diag_mut().fill(1.0);
            }
            PrescriptionKind::AntiTridiag => {
                mask.slice_mut(s![..;-1, ..]).diag_mut().fill(1.0);
                mask.slice_mut(s![..;-1, 1..]).diag_mut().fill(1.0);
                mask.slice_mut(s![..-1;-1, ..]).diag_mut().fill(1.0);
            }
            PrescriptionKind::Incoherent => mask.fill(1.0),
        }
        prescription.nullify_central();
        Ok(prescription)
    }

    /// a.k.a. 3 point renormalization.
    pub fn ren(grid: ScaleGrid) -> Result<Self> {
        Self::new(PrescriptionKind::Ren, grid, None, None)
    }

    /// a.k.a. 3 point factorization.
    pub fn fact(grid: ScaleGrid) -> Result<Self> {
        Self::new(PrescriptionKind::Fact, grid, None, None)
    }

    /// a.k.a. 3 point correlated.
    pub fn sum(grid: ScaleGrid) -> Result<Self> {
        Self::new(PrescriptionKind::Sum, grid, None, None)
    }

    /// a.k.a. 3 point anti-correlated.
    pub fn antisum(grid: ScaleGrid) -> Result<Self> {
        Self::new(PrescriptionKind::AntiSum, grid, None, None)
    }

    /// a.k.a. 5 point.
    pub fn christ(grid: ScaleGrid) -> Result<Self> {
        Self::new(PrescriptionKind::Christ, grid, None, None)
    }

    /// a.k.a. 5 point correlated.
    pub fn standrews(grid: ScaleGrid) -> Result<Self> {
        Self::new(PrescriptionKind::StAndrews, grid, None, None)
    }

    /// a.k.a. 7 point.
    pub fn tridiag(grid: ScaleGrid) -> Result<Self> {
        Self::new(PrescriptionKind::Tridiag, grid, None, None)
    }

    /// a.k.a. 7 point anti-correlated.
    pub fn antitridiag(grid: ScaleGrid) -> Result<Self> {
        Self::new(PrescriptionKind::AntiTridiag, grid, None, None)
    }

    /// a.k.a. 9 point.
    pub fn incoherent(grid: ScaleGrid) -> Result<Self> {
        Self::new(PrescriptionKind::Incoherent, grid, None, None)
    }

    /// Elementwise OR of two binary masks, centred like `self`.
    pub fn union(&self, other: &Prescription, name: Option<String>) -> Result<Self> {
        if self.mask.dim() != other.mask.dim() {
            let (nf, nr) = self.mask.dim();
            let (of, or) = other.mask.dim();
            return Err(CovmatError::MaskShape {
                expected: [nf, nr],
                found: [of, or],
            });
        }
        let mut mask = Array2::zeros(self.mask.dim());
        Zip::from(&mut mask)
            .and(&self.mask)
            .and(&other.mask)
            .for_each(|out, &a, &b| *out = if a != 0.0 || b != 0.0 { 1.0 } else { 0.0 });
        Self::custom(mask, name, Some(self.f0), Some(self.r0))
    }

    fn nullify_central(&mut self) {
        self.mask[[self.f0, self.r0]] = 0.0;
    }

    pub fn mask(&self) -> &Array2<f64> {
        &self.mask
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn central(&self) -> (usize, usize) {
        (self.f0, self.r0)
    }

    pub fn grid(&self) -> ScaleGrid {
        let (nf, nr) = self.mask.dim();
        ScaleGrid::new(nf, nr)
    }

    /// Number of independent scales.
    ///
    /// `ln(Σ m²) / ln((nf + nr) / 2)` with the central point counted. Integer
    /// for the square binary masks of the usual prescriptions (e.g. 1 for 3
    /// point, 2 for 9 point) but not in general.
    pub fn s(&self) -> f64 {
        let mut counted = self.mask.clone();
        counted[[self.f0, self.r0]] = 1.0;
        let (nf, nr) = counted.dim();
        let squares = counted.mapv(|w| w * w).sum();
        squares.ln() / ((nf + nr) as f64 / 2.0).ln()
    }

    /// Number of prescription points, weighted for non-binary masks.
    pub fn m(&self) -> f64 {
        self.mask.sum()
    }

    /// Normalisation for one factorization and one renormalization scale.
    ///
    /// Not the factor to apply to the theory covariance matrix, which carries
    /// a second renormalization scale; see [`Prescription::normalization`].
    pub fn norm(&self) -> f64 {
        self.s() / self.m()
    }

    /// Overall factor for the theory covariance matrix.
    ///
    /// Blocks are always built with two non-trivial renormalization scales
    /// (naturally off-diagonal, enforced on-diagonal), so the mask
    /// normalisation is further divided by the renormalization extent.
    ///
    /// NaN for a mask without weight; [`Prescription::checked_normalization`]
    /// reports that case instead.
    pub fn normalization(&self) -> f64 {
        self.norm() / self.mask.ncols() as f64
    }

    /// [`Prescription::normalization`], rejecting masks without weight.
    pub fn checked_normalization(&self) -> Result<f64> {
        let normalization = self.normalization();
        if self.m() == 0.0 || !normalization.is_finite() {
            return Err(CovmatError::EmptyMask {
                name: self.name().unwrap_or("custom").to_string(),
            });
        }
        Ok(normalization)
    }

    pub fn summary(&self) -> PrescriptionSummary {
        PrescriptionSummary {
            name: self.name.clone(),
            shape: self.grid().shape(),
            mask: self.mask.rows().into_iter().map(|row| row.to_vec()).collect(),
            m: self.m(),
            s: self.s(),
            norm: self.norm(),
            normalization: self.normalization(),
        }
    }
}

impl fmt::Display for Prescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            writeln!(f, "{name}")?;
        }
        write!(f, "{}", self.mask)
    }
}

/// Reporting view of a prescription.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionSummary {
    pub name: Option<String>,
    pub shape: [usize; 2],
    pub mask: Vec<Vec<f64>>,
    pub m: f64,
    pub s: f64,
    pub norm: f64,
    pub normalization: f64,
}

/// Every named prescription on an `nf × nr` grid, keyed `3`, `3b`, … `9`.
pub fn catalogue(grid: ScaleGrid) -> Result<BTreeMap<&'static str, Prescription>> {
    PrescriptionKind::ALL
        .into_iter()
        .map(|kind| -> Result<(&'static str, Prescription)> {
            Ok((kind.key(), Prescription::new(kind, grid, None, None)?))
        })
        .collect()
}
