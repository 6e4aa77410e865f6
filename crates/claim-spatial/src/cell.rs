//! Chunk-aligned grid cells.

/// Cells are aligned with 16×16 chunks.
pub const CELL_SHIFT: u32 = 4;

/// Cell edge length in blocks.
pub const CELL_SIZE: i32 = 1 << CELL_SHIFT;

/// Key of one grid cell, in cell (chunk) coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub x: i32,
    pub z: i32,
}

impl CellKey {
    /// Cell containing the block column `(x, z)`.
    ///
    /// Arithmetic shift rounds toward negative infinity, so block -1 lands in
    /// cell -1 rather than 0.
    #[must_use]
    pub const fn containing(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x >> CELL_SHIFT,
            z: block_z >> CELL_SHIFT,
        }
    }

    /// Lowest block coordinate covered by this cell.
    #[must_use]
    pub const fn origin(self) -> (i32, i32) {
        (self.x << CELL_SHIFT, self.z << CELL_SHIFT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_at_position() {
        assert_eq!(CellKey::containing(0, 0), CellKey { x: 0, z: 0 });
        assert_eq!(CellKey::containing(15, 15), CellKey { x: 0, z: 0 });
        assert_eq!(CellKey::containing(16, 0), CellKey { x: 1, z: 0 });
        assert_eq!(CellKey::containing(-1, -16), CellKey { x: -1, z: -1 });
        assert_eq!(CellKey::containing(-17, 0), CellKey { x: -2, z: 0 });
    }

    #[test]
    fn test_origin() {
        assert_eq!(CellKey { x: -2, z: 3 }.origin(), (-32, 48));
    }
}
