// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Theory covariance matrices from scale-variation shifts.
//!
//! Shifts of `P` processes are sampled (or supplied) as `(points, nf, nr)`
//! arrays, promoted so that each renormalization scale lives on its own axis,
//! and contracted pairwise into an `(N, N)` block matrix. Prescriptions enter
//! as masks on the raw shifts and an overall normalisation.

pub mod axes;
pub mod coarse;
pub mod contract;
pub mod error;
pub mod grid;
pub mod pipeline;
pub mod prescription;
pub mod sampler;

pub use axes::{promote, promote_dyn, AxisLayout, AxisRole, PromotedShifts};
pub use coarse::block_sum;
pub use contract::{block, contract_pair, thcovmat, Degeneracy, DegeneracyTable};
pub use error::{CovmatError, Result};
pub use grid::ScaleGrid;
pub use pipeline::{apply_mask, build, build_with_prescription, from_sizes};
pub use prescription::{catalogue, Prescription, PrescriptionKind, PrescriptionSummary};
pub use sampler::{raw_shifts, ShiftSampler, ShiftSignature};
