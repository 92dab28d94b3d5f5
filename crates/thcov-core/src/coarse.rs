// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use ndarray::{s, Array2};

use crate::error::{CovmatError, Result};

/// Coarse-grains a square matrix by summing disjoint `block_size` squares.
///
/// A trailing block that does not fit entirely is dropped, so the result is
/// `(dim / block_size, dim / block_size)`.
pub fn block_sum(matrix: &Array2<f64>, block_size: usize) -> Result<Array2<f64>> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(CovmatError::NonSquare { rows, cols });
    }
    if block_size == 0 {
        return Err(CovmatError::InvalidBlockSize(block_size));
    }
    let blocks = rows / block_size;
    Ok(Array2::from_shape_fn((blocks, blocks), |(bi, bj)| {
        let (r, c) = (bi * block_size, bj * block_size);
        matrix
            .slice(s![r..r + block_size, c..c + block_size])
            .sum()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn sums_complete_blocks_and_drops_remainder() {
        let m = Array2::from_shape_fn((5, 5), |(i, j)| (i * 5 + j) as f64);
        let blocked = block_sum(&m, 2).unwrap();
        assert_eq!(blocked, array![[12., 20.], [52., 60.]]);
    }

    #[test]
    fn unit_blocks_are_identity() {
        let m = array![[1., 2.], [3., 4.]];
        assert_eq!(block_sum(&m, 1).unwrap(), m);
    }

    #[test]
    fn oversized_block_yields_empty_matrix() {
        let m = Array2::<f64>::ones((3, 3));
        assert_eq!(block_sum(&m, 4).unwrap().dim(), (0, 0));
    }

    #[test]
    fn rejects_non_square_input() {
        let m = Array2::<f64>::zeros((2, 3));
        assert_eq!(
            block_sum(&m, 1).unwrap_err(),
            CovmatError::NonSquare { rows: 2, cols: 3 }
        );
        assert_eq!(
            block_sum(&Array2::zeros((2, 2)), 0).unwrap_err(),
            CovmatError::InvalidBlockSize(0)
        );
    }
}
