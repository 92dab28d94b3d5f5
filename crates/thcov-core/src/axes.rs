// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Axis promotion for per-process renormalization scales.
//!
//! The renormalization scale of each process has its own meaning, so each one
//! lives on its own axis. For `P` processes every promoted tensor has rank
//! `P + 2`:
//!
//! ```text
//! axis:   0       1              2        3              P + 1
//! role:   points  factorization  ren(0)   ren(1)   ...   ren(P - 1)
//! ```
//!
//! Process `k` has its real renormalization extent on axis `k + 2` and a
//! length-1 axis at every other renormalization slot. A length-1 axis means
//! "this datum does not depend on that scale" and broadcasts against the real
//! extent of the owning process during contraction.

use std::fmt;

use ndarray::{Array3, ArrayD, Axis, Ix3};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{CovmatError, Result};

/// Meaning of one axis of a promoted shift tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisRole {
    /// Data points of the process, kept in the output.
    Points,
    /// Shared factorization scale, always contracted.
    Factorization,
    /// Renormalization scale owned by the given process.
    Renormalization(usize),
}

impl fmt::Display for AxisRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisRole::Points => write!(f, "points"),
            AxisRole::Factorization => write!(f, "muf"),
            AxisRole::Renormalization(process) => write!(f, "mur[{process}]"),
        }
    }
}

/// Table of axis roles shared by all promoted tensors of one computation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AxisLayout {
    roles: Vec<AxisRole>,
}

impl AxisLayout {
    pub const POINTS_AXIS: usize = 0;
    pub const FACTORIZATION_AXIS: usize = 1;
    pub const FIRST_RENORMALIZATION_AXIS: usize = 2;

    pub fn new(processes: usize) -> Self {
        let mut roles = Vec::with_capacity(processes + Self::FIRST_RENORMALIZATION_AXIS);
        roles.push(AxisRole::Points);
        roles.push(AxisRole::Factorization);
        roles.extend((0..processes).map(AxisRole::Renormalization));
        Self { roles }
    }

    pub fn processes(&self) -> usize {
        self.roles.len() - Self::FIRST_RENORMALIZATION_AXIS
    }

    pub fn rank(&self) -> usize {
        self.roles.len()
    }

    pub fn roles(&self) -> &[AxisRole] {
        &self.roles
    }

    pub fn role(&self, axis: usize) -> Option<AxisRole> {
        self.roles.get(axis).copied()
    }

    /// Axis carrying the renormalization scale of `process`.
    pub fn renormalization_axis(&self, process: usize) -> usize {
        process + Self::FIRST_RENORMALIZATION_AXIS
    }

    /// Renormalization axes `process` does not own, in increasing order.
    pub fn foreign_axes(&self, process: usize) -> Vec<usize> {
        (0..self.processes())
            .filter(|&other| other != process)
            .map(|other| self.renormalization_axis(other))
            .collect()
    }

    /// Shape of the promoted tensor of `process`.
    pub fn promoted_shape(
        &self,
        process: usize,
        points: usize,
        nf: usize,
        nr: usize,
    ) -> Vec<usize> {
        self.roles
            .iter()
            .map(|role| match *role {
                AxisRole::Points => points,
                AxisRole::Factorization => nf,
                AxisRole::Renormalization(owner) if owner == process => nr,
                AxisRole::Renormalization(_) => 1,
            })
            .collect()
    }
}

/// Shifts of one process, blown up to the rank of an [`AxisLayout`].
#[derive(Clone, Debug, PartialEq)]
pub struct PromotedShifts {
    process: usize,
    data: ArrayD<f64>,
}

impl PromotedShifts {
    /// Wraps an already promoted tensor, checking it against `layout`.
    ///
    /// The real renormalization extent must sit on the slot `process` owns and
    /// every other renormalization slot must be length-1.
    pub fn new(process: usize, data: ArrayD<f64>, layout: &AxisLayout) -> Result<Self> {
        if process >= layout.processes() {
            return Err(CovmatError::UnknownProcess {
                process,
                processes: layout.processes(),
            });
        }
        if data.ndim() != layout.rank() {
            return Err(CovmatError::Rank {
                process,
                expected: layout.rank(),
                found: data.ndim(),
            });
        }
        let own = layout.renormalization_axis(process);
        let expected = layout.promoted_shape(
            process,
            data.len_of(Axis(AxisLayout::POINTS_AXIS)),
            data.len_of(Axis(AxisLayout::FACTORIZATION_AXIS)),
            data.len_of(Axis(own)),
        );
        if let Some(axis) = (AxisLayout::FIRST_RENORMALIZATION_AXIS..layout.rank())
            .find(|&axis| data.len_of(Axis(axis)) != expected[axis])
        {
            return Err(CovmatError::MisplacedRenormalization {
                process,
                axis,
                expected: expected[axis],
                extent: data.len_of(Axis(axis)),
            });
        }
        Ok(Self { process, data })
    }

    pub fn process(&self) -> usize {
        self.process
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn points(&self) -> usize {
        self.data.len_of(Axis(AxisLayout::POINTS_AXIS))
    }

    pub fn factorization_extent(&self) -> usize {
        self.data.len_of(Axis(AxisLayout::FACTORIZATION_AXIS))
    }

    /// Product of all renormalization slot extents.
    ///
    /// With a single non-trivial slot this is the process' own extent.
    pub fn renormalization_extent(&self) -> usize {
        self.data.shape()[AxisLayout::FIRST_RENORMALIZATION_AXIS..]
            .iter()
            .product()
    }
}

/// Inserts a length-1 axis at the renormalization slot of every other process.
///
/// The raw batches are `(points, nf, nr)` and are left untouched.
pub fn promote(raw: &[Array3<f64>]) -> Result<Vec<PromotedShifts>> {
    let layout = AxisLayout::new(raw.len());
    raw.iter()
        .enumerate()
        .map(|(process, batch)| {
            let mut data = batch.clone().into_dyn();
            // increasing order keeps the absolute positions valid while inserting
            for axis in layout.foreign_axes(process) {
                data = data.insert_axis(Axis(axis));
            }
            let (points, nf, nr) = batch.dim();
            debug_assert_eq!(
                data.shape(),
                layout.promoted_shape(process, points, nf, nr).as_slice()
            );
            trace!(process, shape = ?data.shape(), "promoted shifts");
            PromotedShifts::new(process, data, &layout)
        })
        .collect()
}

/// Builds promoted shifts from a dynamic-rank array per process.
///
/// Each input must be rank 3; useful when shifts come from an external source.
pub fn promote_dyn(raw: &[ArrayD<f64>]) -> Result<Vec<PromotedShifts>> {
    let batches = raw
        .iter()
        .enumerate()
        .map(|(process, batch)| {
            batch
                .view()
                .into_dimensionality::<Ix3>()
                .map(|view| view.to_owned())
                .map_err(|_| CovmatError::Rank {
                    process,
                    expected: 3,
                    found: batch.ndim(),
                })
        })
        .collect::<Result<Vec<_>>>()?;
    promote(&batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    #[test]
    fn layout_assigns_one_slot_per_process() {
        let layout = AxisLayout::new(3);
        assert_eq!(layout.rank(), 5);
        assert_eq!(
            layout.roles(),
            &[
                AxisRole::Points,
                AxisRole::Factorization,
                AxisRole::Renormalization(0),
                AxisRole::Renormalization(1),
                AxisRole::Renormalization(2),
            ]
        );
        assert_eq!(layout.renormalization_axis(1), 3);
        assert_eq!(layout.foreign_axes(1), vec![2, 4]);
        assert_eq!(layout.role(7), None);
    }

    #[test]
    fn promoted_shapes_put_real_extent_on_own_slot() {
        let raw = vec![
            Array3::<f64>::zeros((2, 3, 3)),
            Array3::<f64>::zeros((4, 3, 3)),
            Array3::<f64>::zeros((1, 3, 3)),
        ];
        let promoted = promote(&raw).unwrap();
        assert_eq!(promoted[0].shape(), &[2, 3, 3, 1, 1]);
        assert_eq!(promoted[1].shape(), &[4, 3, 1, 3, 1]);
        assert_eq!(promoted[2].shape(), &[1, 3, 1, 1, 3]);
        for p in &promoted {
            assert_eq!(p.renormalization_extent(), 3);
            assert_eq!(p.factorization_extent(), 3);
        }
    }

    #[test]
    fn promotion_preserves_values() {
        let batch = Array::from_shape_fn((2, 3, 3), |(p, f, r)| (p * 100 + f * 10 + r) as f64);
        let promoted = promote(&[Array3::zeros((1, 3, 3)), batch.clone()]).unwrap();
        let data = promoted[1].data();
        for ((p, f, r), &value) in batch.indexed_iter() {
            assert_eq!(data[[p, f, 0, r]], value);
        }
    }

    #[test]
    fn single_process_keeps_raw_rank() {
        let promoted = promote(&[Array3::<f64>::ones((5, 3, 3))]).unwrap();
        assert_eq!(promoted[0].shape(), &[5, 3, 3]);
    }

    #[test]
    fn dynamic_input_must_be_rank_three() {
        let bad = vec![ArrayD::<f64>::zeros(IxDyn(&[2, 3]))];
        let err = promote_dyn(&bad).unwrap_err();
        assert_eq!(
            err,
            CovmatError::Rank {
                process: 0,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn wrapping_checks_slot_ownership() {
        let layout = AxisLayout::new(2);
        let own = ArrayD::<f64>::ones(IxDyn(&[3, 3, 1, 3]));
        assert!(PromotedShifts::new(1, own, &layout).is_ok());

        let misplaced = ArrayD::<f64>::ones(IxDyn(&[3, 3, 3, 1]));
        assert_eq!(
            PromotedShifts::new(1, misplaced, &layout).unwrap_err(),
            CovmatError::MisplacedRenormalization {
                process: 1,
                axis: 2,
                expected: 1,
                extent: 3
            }
        );

        let outside = ArrayD::<f64>::ones(IxDyn(&[3, 3, 1, 3]));
        assert_eq!(
            PromotedShifts::new(2, outside, &layout).unwrap_err(),
            CovmatError::UnknownProcess {
                process: 2,
                processes: 2
            }
        );
    }

    #[test]
    fn role_names_render() {
        assert_eq!(AxisRole::Renormalization(4).to_string(), "mur[4]");
        assert_eq!(AxisRole::Factorization.to_string(), "muf");
    }
}
