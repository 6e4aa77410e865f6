//! Per-actor corner-designation workflow.
//!
//! ```text
//! Idle ──corner──▶ FirstCornerSet ──corner──▶ Committed ──▶ Idle
//!                        │                 └▶ Rejected  ──▶ Idle
//!                        └── cancel / mode change ────────▶ Idle
//! ```

use claim_spatial::{BlockPos, Bounds};
use serde::{Deserialize, Serialize};

use crate::{ClaimConfig, RegionId, WorldId};

/// Tool mode chosen by the actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShovelMode {
    #[default]
    Basic,
    /// New claims are administrative.
    Admin,
    /// First corners inside an editable region start a subdivision.
    Subdivide,
}

/// What the pending corner will produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingTarget {
    NewClaim,
    NewAdminClaim,
    Subdivision { parent: RegionId },
    Resize { region: RegionId },
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    FirstCornerSet {
        world: WorldId,
        corner: BlockPos,
        target: PendingTarget,
    },
}

/// Result of a corner designation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CornerOutcome {
    /// First corner recorded.
    Pending(PendingTarget),
    /// Region created or resized.
    Committed(RegionId),
    /// Same block clicked twice during a resize.
    Ignored,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Workflow {
    pub mode: ShovelMode,
    pub state: WorkflowState,
}

/// Lowest Y allowed by `max_depth`.
fn clamp_depth(y: i32, config: &ClaimConfig) -> i32 {
    config.max_depth.map_or(y, |depth| y.max(depth))
}

/// Bounds for a new region spanning two designated corners.
///
/// The bottom reaches `ground_extension` below the lower corner, clamped to
/// `max_depth`; the top is the higher corner or `claim_ceiling`.
#[must_use]
pub(crate) fn new_region_bounds(first: BlockPos, second: BlockPos, config: &ClaimConfig) -> Bounds {
    let footprint = Bounds::from_corners(first, second);
    let min_y = clamp_depth(footprint.min().y.saturating_sub(config.ground_extension), config);
    let max_y = config
        .claim_ceiling
        .map_or(footprint.max().y, |ceiling| ceiling.max(footprint.max().y));
    footprint.with_y_range(min_y, max_y)
}

/// Bounds after dragging the `grabbed` corner of `current` to `moved`.
///
/// Each footprint edge the grabbed corner sat on follows the new corner; the
/// opposite edges stay put. The bottom can only deepen.
#[must_use]
pub(crate) fn resized_bounds(
    current: &Bounds,
    grabbed: BlockPos,
    moved: BlockPos,
    config: &ClaimConfig,
) -> Bounds {
    let (min, max) = (current.min(), current.max());

    let (x1, x2) = if grabbed.x == min.x {
        (moved.x, max.x)
    } else {
        (min.x, moved.x)
    };
    let (z1, z2) = if grabbed.z == min.z {
        (moved.z, max.z)
    } else {
        (min.z, moved.z)
    };

    let dug = moved.y.saturating_sub(config.ground_extension);
    let min_y = clamp_depth(min.y.min(dug), config);
    let max_y = max.y.max(min_y);

    Bounds::from_corners(BlockPos::new(x1, min_y, z1), BlockPos::new(x2, max_y, z2))
}

/// Bounds of the square `radius` around `center`, or `None` if a corner
/// leaves the coordinate range.
#[must_use]
pub(crate) fn square_around(
    center: BlockPos,
    radius: i32,
    config: &ClaimConfig,
) -> Option<Bounds> {
    let low = center.checked_offset(radius.checked_neg()?, 0, radius.checked_neg()?)?;
    let high = center.checked_offset(radius, 0, radius)?;
    Some(new_region_bounds(low, high, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bounds_extend_into_ground() {
        let config = ClaimConfig::default();
        let b = new_region_bounds(BlockPos::new(0, 60, 0), BlockPos::new(10, 70, 10), &config);
        assert_eq!(b.min(), BlockPos::new(0, 55, 0));
        assert_eq!(b.max(), BlockPos::new(10, 70, 10));
    }

    #[test]
    fn test_new_bounds_respect_depth_and_ceiling() {
        let config = ClaimConfig {
            max_depth: Some(58),
            claim_ceiling: Some(320),
            ..ClaimConfig::default()
        };
        let b = new_region_bounds(BlockPos::new(0, 60, 0), BlockPos::new(10, 64, 10), &config);
        assert_eq!(b.min().y, 58);
        assert_eq!(b.max().y, 320);
    }

    #[test]
    fn test_resize_moves_grabbed_edges_only() {
        let config = ClaimConfig::default();
        let current = Bounds::from_corners(BlockPos::new(0, 50, 0), BlockPos::new(10, 70, 10));

        let grown = resized_bounds(&current, BlockPos::new(10, 64, 10), BlockPos::new(20, 64, 15), &config);
        assert_eq!(grown.min(), BlockPos::new(0, 50, 0));
        assert_eq!(grown.max(), BlockPos::new(20, 70, 15));

        let shifted = resized_bounds(&current, BlockPos::new(0, 64, 10), BlockPos::new(-5, 40, 12), &config);
        assert_eq!(shifted.min(), BlockPos::new(-5, 35, 0));
        assert_eq!(shifted.max(), BlockPos::new(10, 70, 12));
    }

    #[test]
    fn test_square_around() {
        let config = ClaimConfig::default();
        let b = square_around(BlockPos::new(100, 64, -100), 5, &config).unwrap();
        assert_eq!(b.width(), 11);
        assert_eq!(b.area(), 121);
        assert_eq!(b.min(), BlockPos::new(95, 59, -105));
    }
}
