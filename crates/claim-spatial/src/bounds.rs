//! Block positions and axis-aligned claim boxes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cell::CellKey;

/// Integer block coordinate in a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Offset by the given deltas.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    /// Offset by the given deltas, or `None` if any axis leaves the `i32` range.
    #[must_use]
    pub const fn checked_offset(self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        match (
            self.x.checked_add(dx),
            self.y.checked_add(dy),
            self.z.checked_add(dz),
        ) {
            (Some(x), Some(y), Some(z)) => Some(Self { x, y, z }),
            _ => None,
        }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// An inclusive axis-aligned box of blocks.
///
/// X/Z span the footprint, Y the vertical extent. Both corners are part of
/// the box, so a box from `(0, 0, 0)` to `(9, 0, 9)` has a footprint of
/// 10 × 10 blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    min: BlockPos,
    /// Constructors keep this component-wise `>= min`.
    max: BlockPos,
}

impl Bounds {
    /// Build a box from any two opposite corners.
    #[must_use]
    pub fn from_corners(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Build a box from explicit min/max corners.
    ///
    /// Returns `None` if `min` exceeds `max` on any axis.
    #[must_use]
    pub fn try_new(min: BlockPos, max: BlockPos) -> Option<Self> {
        (min.x <= max.x && min.y <= max.y && min.z <= max.z).then_some(Self { min, max })
    }

    #[must_use]
    pub const fn min(&self) -> BlockPos {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> BlockPos {
        self.max
    }

    /// Whether the min/max ordering still holds (it may not for deserialized data).
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Footprint extent along X.
    #[must_use]
    pub const fn width(&self) -> i64 {
        self.max.x as i64 - self.min.x as i64 + 1
    }

    /// Footprint extent along Z.
    #[must_use]
    pub const fn length(&self) -> i64 {
        self.max.z as i64 - self.min.z as i64 + 1
    }

    #[must_use]
    pub const fn height(&self) -> i64 {
        self.max.y as i64 - self.min.y as i64 + 1
    }

    /// Footprint area in blocks; this is what claims cost.
    #[must_use]
    pub const fn area(&self) -> i64 {
        self.width().saturating_mul(self.length())
    }

    /// Copy with a different vertical range, keeping the footprint.
    #[must_use]
    pub fn with_y_range(self, min_y: i32, max_y: i32) -> Self {
        Self {
            min: BlockPos::new(self.min.x, min_y.min(max_y), self.min.z),
            max: BlockPos::new(self.max.x, min_y.max(max_y), self.max.z),
        }
    }

    /// Whether `(x, z)` lies in the footprint.
    #[must_use]
    pub const fn footprint_contains(&self, x: i32, z: i32) -> bool {
        x >= self.min.x && x <= self.max.x && z >= self.min.z && z <= self.max.z
    }

    /// Point containment. With `ignore_height` only the footprint is tested.
    #[must_use]
    pub const fn contains(&self, pos: BlockPos, ignore_height: bool) -> bool {
        self.footprint_contains(pos.x, pos.z)
            && (ignore_height || (pos.y >= self.min.y && pos.y <= self.max.y))
    }

    /// Whether the X/Z projections of the two boxes share at least one block.
    #[must_use]
    pub const fn footprint_overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    /// Whether `other`'s footprint lies entirely inside this footprint.
    #[must_use]
    pub const fn footprint_encloses(&self, other: &Self) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.z >= self.min.z
            && other.max.z <= self.max.z
    }

    /// Whether `(x, z)` is one of the four footprint corners.
    #[must_use]
    pub const fn is_footprint_corner(&self, x: i32, z: i32) -> bool {
        (x == self.min.x || x == self.max.x) && (z == self.min.z || z == self.max.z)
    }

    /// All grid cells the footprint touches.
    pub fn cells(&self) -> impl Iterator<Item = CellKey> + use<> {
        let lo = CellKey::containing(self.min.x, self.min.z);
        let hi = CellKey::containing(self.max.x, self.max.z);
        (lo.x..=hi.x).flat_map(move |x| (lo.z..=hi.z).map(move |z| CellKey { x, z }))
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_offset_stops_at_range() {
        let pos = BlockPos::new(1, 70, -1);
        assert_eq!(pos.checked_offset(2, 0, -2), Some(BlockPos::new(3, 70, -3)));
        assert_eq!(pos.checked_offset(i32::MAX, 0, 0), None);
        assert_eq!(pos.checked_offset(0, 0, i32::MIN), None);
    }

    #[test]
    fn test_from_corners_normalizes() {
        let b = Bounds::from_corners(BlockPos::new(10, 70, -3), BlockPos::new(0, 60, 5));
        assert_eq!(b.min(), BlockPos::new(0, 60, -3));
        assert_eq!(b.max(), BlockPos::new(10, 70, 5));
        assert_eq!(b.width(), 11);
        assert_eq!(b.length(), 9);
        assert_eq!(b.area(), 99);
    }

    #[test]
    fn test_try_new_rejects_inverted() {
        assert!(Bounds::try_new(BlockPos::new(5, 0, 0), BlockPos::new(4, 0, 0)).is_none());
        assert!(Bounds::try_new(BlockPos::new(0, 0, 0), BlockPos::new(0, 0, 0)).is_some());
    }

    #[test]
    fn test_contains_respects_height_flag() {
        let b = Bounds::from_corners(BlockPos::new(0, 60, 0), BlockPos::new(10, 70, 10));
        assert!(b.contains(BlockPos::new(5, 65, 5), false));
        assert!(!b.contains(BlockPos::new(5, 20, 5), false));
        assert!(b.contains(BlockPos::new(5, 20, 5), true));
        assert!(!b.contains(BlockPos::new(11, 65, 5), true));
    }

    #[test]
    fn test_footprint_overlap_ignores_y() {
        let a = Bounds::from_corners(BlockPos::new(0, 0, 0), BlockPos::new(9, 5, 9));
        let b = Bounds::from_corners(BlockPos::new(9, 100, 9), BlockPos::new(20, 120, 20));
        let c = Bounds::from_corners(BlockPos::new(10, 0, 0), BlockPos::new(20, 5, 9));
        assert!(a.footprint_overlaps(&b));
        assert!(!a.footprint_overlaps(&c));
        assert!(!c.footprint_overlaps(&a));
    }

    #[test]
    fn test_encloses_and_corners() {
        let outer = Bounds::from_corners(BlockPos::new(0, 0, 0), BlockPos::new(20, 0, 20));
        let inner = Bounds::from_corners(BlockPos::new(2, 50, 2), BlockPos::new(20, 60, 5));
        assert!(outer.footprint_encloses(&inner));
        assert!(!inner.footprint_encloses(&outer));
        assert!(outer.is_footprint_corner(20, 0));
        assert!(!outer.is_footprint_corner(10, 0));
    }

    #[test]
    fn test_cells_cover_negative_coordinates() {
        let b = Bounds::from_corners(BlockPos::new(-1, 0, -1), BlockPos::new(16, 0, 0));
        let cells: Vec<_> = b.cells().collect();
        assert_eq!(cells.len(), 3 * 2);
        assert!(cells.contains(&CellKey { x: -1, z: -1 }));
        assert!(cells.contains(&CellKey { x: 1, z: 0 }));
    }
}
