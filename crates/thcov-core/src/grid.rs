// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use serde::{Deserialize, Serialize};

/// Number of scale variation points along the factorization (`nf`) and
/// renormalization (`nr`) directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScaleGrid {
    pub nf: usize,
    pub nr: usize,
}

impl Default for ScaleGrid {
    fn default() -> Self {
        Self { nf: 3, nr: 3 }
    }
}

impl ScaleGrid {
    pub fn new(nf: usize, nr: usize) -> Self {
        Self { nf, nr }
    }

    /// Square `n × n` grid.
    pub fn square(n: usize) -> Self {
        Self { nf: n, nr: n }
    }

    pub fn points(&self) -> usize {
        self.nf * self.nr
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.nf, self.nr]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_is_three_by_three() {
        let grid = ScaleGrid::default();
        assert_eq!(grid.shape(), [3, 3]);
        assert_eq!(grid.points(), 9);
    }

    #[test]
    fn serializes_as_plain_extents() {
        let json = serde_json::to_value(ScaleGrid::new(5, 3)).unwrap();
        assert_eq!(json, serde_json::json!({ "nf": 5, "nr": 3 }));
    }
}
