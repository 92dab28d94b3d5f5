// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Block contraction of promoted shifts into the theory covariance matrix.
//!
//! Block `(i, j)` applies Eq. (4.2) of arXiv:1906.10698 literally to the pair:
//! the promoted tensors are broadcast against each other on every non-point
//! axis, multiplied, and summed over those axes,
//!
//! ```text
//! S_ij[p, q] = Σ_{f, r_0 .. r_{P-1}} Δ_i[p, f, r..] Δ_j[q, f, r..]
//! ```
//!
//! Only one pair is ever broadcast at a time. Materialising every
//! renormalization axis at full extent at once would grow as `nr^P`.
//!
//! Renormalization axes foreign to both operands stay length-1 and contribute
//! a uniform degeneracy that cancels against the normalisation, so they are
//! skipped. The remaining live axes are two for off-diagonal blocks but only
//! one on the diagonal, where both operands share the same slot. The
//! [`DegeneracyTable`] restores the missing factor of `nr` there.

use std::ops::Range;

use ndarray::{s, Array2, IxDyn};
use tracing::{debug, info, info_span};

use crate::axes::{AxisLayout, PromotedShifts};
use crate::error::{CovmatError, Result};

/// One row of the degeneracy table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Degeneracy {
    pub diagonal: bool,
    /// Renormalization slots that are length-1 for both operands.
    pub foreign_singletons: usize,
    pub factor: f64,
}

/// Multipliers that bring every block to the same number of live
/// renormalization axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DegeneracyTable {
    nr: usize,
    processes: usize,
}

impl DegeneracyTable {
    /// Live renormalization axes every block is normalised to.
    pub const LIVE_AXES: usize = 2;

    pub fn new(nr: usize, processes: usize) -> Self {
        Self { nr, processes }
    }

    pub fn nr(&self) -> usize {
        self.nr
    }

    /// Slots owned by neither `i` nor `j`.
    pub fn foreign_singletons(&self, i: usize, j: usize) -> usize {
        let owned = if i == j { 1 } else { 2 };
        self.processes.saturating_sub(owned)
    }

    /// `nr^(LIVE_AXES - live)` with `live = processes - foreign_singletons`.
    ///
    /// Diagonal blocks have one live axis, off-diagonal blocks two.
    pub fn factor(&self, foreign_singletons: usize) -> f64 {
        let live = self.processes.saturating_sub(foreign_singletons);
        let missing = Self::LIVE_AXES.saturating_sub(live);
        (self.nr as f64).powi(missing as i32)
    }

    pub fn entry(&self, i: usize, j: usize) -> Degeneracy {
        let diagonal = i == j;
        let foreign_singletons = self.foreign_singletons(i, j);
        Degeneracy {
            diagonal,
            foreign_singletons,
            factor: self.factor(foreign_singletons),
        }
    }

    /// Distinct entries for this number of processes, diagonal first.
    pub fn rows(&self) -> Vec<Degeneracy> {
        let mut rows = vec![self.entry(0, 0)];
        if self.processes > 1 {
            rows.push(self.entry(0, 1));
        }
        rows
    }
}

/// Common extents of the non-point axes of `a` and `b` under broadcasting.
pub fn broadcast_inner_shape(a: &PromotedShifts, b: &PromotedShifts) -> Result<Vec<usize>> {
    if a.shape().len() != b.shape().len() {
        return Err(CovmatError::Rank {
            process: b.process(),
            expected: a.shape().len(),
            found: b.shape().len(),
        });
    }
    a.shape()
        .iter()
        .zip(b.shape())
        .enumerate()
        .filter(|(axis, _)| *axis != AxisLayout::POINTS_AXIS)
        .map(|(axis, (&lhs, &rhs))| match (lhs, rhs) {
            _ if lhs == rhs => Ok(lhs),
            (1, _) => Ok(rhs),
            (_, 1) => Ok(lhs),
            _ if axis == AxisLayout::FACTORIZATION_AXIS => {
                Err(CovmatError::FactorizationMismatch {
                    process: b.process(),
                    expected: lhs,
                    found: rhs,
                })
            }
            _ => Err(CovmatError::RenormalizationMismatch {
                process: b.process(),
                expected: lhs,
                found: rhs,
            }),
        })
        .collect()
}

/// Broadcasts `shifts` to `(points, inner..)` and flattens the inner axes.
fn flatten_broadcast(shifts: &PromotedShifts, inner: &[usize]) -> Result<Array2<f64>> {
    let points = shifts.points();
    let mut full = Vec::with_capacity(inner.len() + 1);
    full.push(points);
    full.extend_from_slice(inner);
    let view = shifts.data().broadcast(IxDyn(&full)).ok_or_else(|| {
        CovmatError::Shape(format!(
            "cannot broadcast {:?} to {:?}",
            shifts.shape(),
            full
        ))
    })?;
    let width = inner.iter().product::<usize>();
    Array2::from_shape_vec((points, width), view.iter().copied().collect())
        .map_err(|err| CovmatError::Shape(err.to_string()))
}

/// Uncorrected contraction of `a` and `b` over every non-point axis.
pub fn contract_pair(a: &PromotedShifts, b: &PromotedShifts) -> Result<Array2<f64>> {
    let inner = broadcast_inner_shape(a, b)?;
    let lhs = flatten_broadcast(a, &inner)?;
    let rhs = flatten_broadcast(b, &inner)?;
    Ok(lhs.dot(&rhs.t()))
}

/// Block `(i, j)` including the degeneracy correction.
pub fn block(
    shifts: &[PromotedShifts],
    i: usize,
    j: usize,
    table: &DegeneracyTable,
) -> Result<Array2<f64>> {
    let operand = |process: usize| {
        shifts.get(process).ok_or(CovmatError::UnknownProcess {
            process,
            processes: shifts.len(),
        })
    };
    let mut block = contract_pair(operand(i)?, operand(j)?)?;
    let degeneracy = table.entry(i, j);
    if degeneracy.factor != 1.0 {
        block *= degeneracy.factor;
    }
    debug!(
        i,
        j,
        rows = block.nrows(),
        cols = block.ncols(),
        factor = degeneracy.factor,
        "contracted block"
    );
    Ok(block)
}

/// Row (and column) range of every process in the assembled matrix.
pub fn block_ranges(shifts: &[PromotedShifts]) -> Vec<Range<usize>> {
    let mut start = 0;
    shifts
        .iter()
        .map(|proc_shifts| {
            let end = start + proc_shifts.points();
            let range = start..end;
            start = end;
            range
        })
        .collect()
}

/// Checks the invariants shared by all processes before any contraction.
///
/// Returns the common renormalization extent.
pub fn validate(shifts: &[PromotedShifts]) -> Result<usize> {
    let first = shifts.first().ok_or(CovmatError::EmptyProcesses)?;
    if let Some((position, proc_shifts)) = shifts
        .iter()
        .enumerate()
        .find(|(position, proc_shifts)| proc_shifts.process() != *position)
    {
        return Err(CovmatError::ProcessOrder {
            position,
            found: proc_shifts.process(),
        });
    }
    let rank = AxisLayout::new(shifts.len()).rank();
    if let Some((process, proc_shifts)) = shifts
        .iter()
        .enumerate()
        .find(|(_, proc_shifts)| proc_shifts.shape().len() != rank)
    {
        return Err(CovmatError::Rank {
            process,
            expected: rank,
            found: proc_shifts.shape().len(),
        });
    }

    // one non-trivial renormalization scale per process, every other slot is 1
    let murs = first.renormalization_extent();
    let nf = first.factorization_extent();
    for (process, proc_shifts) in shifts.iter().enumerate() {
        if proc_shifts.renormalization_extent() != murs {
            return Err(CovmatError::RenormalizationMismatch {
                process,
                expected: murs,
                found: proc_shifts.renormalization_extent(),
            });
        }
        if proc_shifts.factorization_extent() != nf {
            return Err(CovmatError::FactorizationMismatch {
                process,
                expected: nf,
                found: proc_shifts.factorization_extent(),
            });
        }
    }
    Ok(murs)
}

/// Assembles the full `(N, N)` theory covariance matrix, `N = Σ n_k`.
///
/// Only the 9-point prescription is computed here. Other prescriptions mask
/// the raw shifts beforehand and rescale the result afterwards, see
/// [`crate::pipeline`].
///
/// Blocks with `j < i` are filled with the transpose of block `(j, i)`.
pub fn thcovmat(shifts: &[PromotedShifts]) -> Result<Array2<f64>> {
    let murs = validate(shifts)?;
    let table = DegeneracyTable::new(murs, shifts.len());
    let ranges = block_ranges(shifts);
    let total = ranges.last().map_or(0, |range| range.end);

    let span = info_span!("thcovmat", processes = shifts.len(), points = total);
    let _guard = span.enter();

    let mut covmat = Array2::<f64>::zeros((total, total));
    for i in 0..shifts.len() {
        for j in i..shifts.len() {
            let current = block(shifts, i, j, &table)?;
            let (rows, cols) = (ranges[i].clone(), ranges[j].clone());
            if i != j {
                covmat
                    .slice_mut(s![cols.clone(), rows.clone()])
                    .assign(&current.t());
            }
            covmat.slice_mut(s![rows, cols]).assign(&current);
        }
    }
    info!(size = total, murs, "theory covariance matrix assembled");
    Ok(covmat)
}
