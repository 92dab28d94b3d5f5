// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CovmatError>;

/// Errors raised while building a theory covariance matrix.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CovmatError {
    /// Every process must vary its renormalization scale over the same number
    /// of points.
    #[error(
        "all the different renormalization scales should have the same number of points: \
         process {process} has {found}, expected {expected}"
    )]
    RenormalizationMismatch {
        process: usize,
        expected: usize,
        found: usize,
    },
    /// The factorization scale is shared, so its extent must agree everywhere.
    #[error("process {process} has {found} factorization points, expected {expected}")]
    FactorizationMismatch {
        process: usize,
        expected: usize,
        found: usize,
    },
    #[error("process {process} shifts have rank {found}, expected {expected}")]
    Rank {
        process: usize,
        expected: usize,
        found: usize,
    },
    /// Process `k` owns renormalization axis `k + 2` and nothing else.
    #[error(
        "process {process} has extent {extent} on renormalization axis {axis}, expected {expected}"
    )]
    MisplacedRenormalization {
        process: usize,
        axis: usize,
        expected: usize,
        extent: usize,
    },
    #[error("shifts of process {found} supplied at position {position}")]
    ProcessOrder { position: usize, found: usize },
    #[error("process {process} is outside a layout of {processes} processes")]
    UnknownProcess { process: usize, processes: usize },
    #[error("at least one process is required")]
    EmptyProcesses,
    #[error("matrix must be square, got {rows}x{cols}")]
    NonSquare { rows: usize, cols: usize },
    #[error("block size must be positive, got {0}")]
    InvalidBlockSize(usize),
    #[error("mask shape {found:?} does not match the scale grid {expected:?}")]
    MaskShape {
        expected: [usize; 2],
        found: [usize; 2],
    },
    #[error("central scale ({f0}, {r0}) lies outside a {shape:?} mask")]
    CentralOutOfRange {
        f0: usize,
        r0: usize,
        shape: [usize; 2],
    },
    /// A mask with no weight outside the central scale has no normalisation.
    #[error("prescription {name} carries no weight outside the central scale")]
    EmptyMask { name: String },
    #[error("shape error: {0}")]
    Shape(String),
    #[error("invalid sampling distribution: {0}")]
    Distribution(String),
}
