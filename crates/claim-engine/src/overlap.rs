//! Size and overlap validation for new or resized footprints.

use claim_spatial::Bounds;

use crate::{ClaimConfig, ClaimError, ClaimResult, RegionId, RegionIndex, SizeViolation, WorldId};

/// Minimum-size rule. Administrative regions and subdivisions pass `exempt`.
pub fn check_size(bounds: &Bounds, config: &ClaimConfig, exempt: bool) -> Result<(), SizeViolation> {
    if exempt {
        return Ok(());
    }
    if bounds.width() < config.min_width || bounds.length() < config.min_width {
        return Err(SizeViolation::TooNarrow {
            min_width: config.min_width,
        });
    }
    if bounds.area() < config.min_area {
        return Err(SizeViolation::TooSmall {
            min_area: config.min_area,
        });
    }
    Ok(())
}

/// Check `candidate` against its future neighbours.
///
/// Top-level candidates are tested against every other top-level region in
/// `world`; subdivisions must fit their parent and are tested against their
/// siblings. `exclude` skips the region being resized. On conflict the
/// lowest conflicting id is reported.
pub fn validate_new_or_resized(
    index: &RegionIndex,
    candidate: &Bounds,
    world: &WorldId,
    exclude: Option<RegionId>,
    parent: Option<RegionId>,
) -> ClaimResult<()> {
    let neighbours = match parent {
        Some(parent_id) => {
            let parent = index.require(parent_id)?;
            if !parent.bounds.footprint_encloses(candidate) {
                return Err(ClaimError::SubdivisionOutOfParentBounds);
            }
            parent.children.clone()
        }
        None => index.candidates_overlapping(world, candidate),
    };

    // Both lists are sorted, so the first hit is the lowest id.
    let conflict = neighbours
        .into_iter()
        .filter(|id| Some(*id) != exclude)
        .find(|id| {
            index
                .get(*id)
                .is_some_and(|other| other.bounds.footprint_overlaps(candidate))
        });

    match conflict {
        Some(id) => Err(ClaimError::RegionOverlap(id)),
        None => Ok(()),
    }
}

/// Every child of `region` must still fit inside `candidate`.
pub(crate) fn check_children_fit(
    index: &RegionIndex,
    region: RegionId,
    candidate: &Bounds,
) -> ClaimResult<()> {
    let region = index.require(region)?;
    for child_id in &region.children {
        let Some(child) = index.get(*child_id) else {
            continue;
        };
        if !candidate.footprint_encloses(&child.bounds) {
            return Err(ClaimError::SubdivisionOutsideResize(*child_id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use claim_spatial::BlockPos;

    use super::*;
    use crate::{ActorId, Region};

    fn world() -> WorldId {
        WorldId::new("world")
    }

    fn footprint(x0: i32, z0: i32, x1: i32, z1: i32) -> Bounds {
        Bounds::from_corners(BlockPos::new(x0, 0, z0), BlockPos::new(x1, 100, z1))
    }

    fn add(index: &mut RegionIndex, bounds: Bounds, parent: Option<RegionId>) -> RegionId {
        let id = index.allocate_id();
        let owner = parent.is_none().then(|| ActorId::from_u128(1));
        index
            .insert(Region::new(id, world(), bounds, owner, parent, 0))
            .unwrap()
    }

    #[test]
    fn test_size_rule() {
        let config = ClaimConfig::default();
        assert_eq!(check_size(&footprint(0, 0, 9, 9), &config, false), Ok(()));
        assert_eq!(
            check_size(&footprint(0, 0, 3, 100), &config, false),
            Err(SizeViolation::TooNarrow { min_width: 5 })
        );
        assert_eq!(
            check_size(&footprint(0, 0, 8, 8), &config, false),
            Err(SizeViolation::TooSmall { min_area: 100 })
        );
        assert_eq!(check_size(&footprint(0, 0, 1, 1), &config, true), Ok(()));
    }

    #[test]
    fn test_overlap_reports_lowest_id() {
        let mut index = RegionIndex::new();
        let a = add(&mut index, footprint(0, 0, 9, 9), None);
        let b = add(&mut index, footprint(20, 0, 29, 9), None);

        let wide = footprint(5, 5, 25, 6);
        assert_eq!(
            validate_new_or_resized(&index, &wide, &world(), None, None),
            Err(ClaimError::RegionOverlap(a))
        );
        assert_eq!(
            validate_new_or_resized(&index, &wide, &world(), Some(a), None),
            Err(ClaimError::RegionOverlap(b))
        );
        assert_eq!(
            validate_new_or_resized(&index, &footprint(10, 0, 19, 9), &world(), None, None),
            Ok(())
        );
        assert_eq!(
            validate_new_or_resized(&index, &wide, &WorldId::new("nether"), None, None),
            Ok(())
        );
    }

    #[test]
    fn test_overlap_ignores_height() {
        let mut index = RegionIndex::new();
        let a = add(&mut index, footprint(0, 0, 9, 9), None);
        let high = Bounds::from_corners(BlockPos::new(0, 200, 0), BlockPos::new(9, 250, 9));
        assert_eq!(
            validate_new_or_resized(&index, &high, &world(), None, None),
            Err(ClaimError::RegionOverlap(a))
        );
    }

    #[test]
    fn test_subdivision_rules() {
        let mut index = RegionIndex::new();
        let root = add(&mut index, footprint(0, 0, 40, 40), None);
        let first = add(&mut index, footprint(0, 0, 9, 9), Some(root));

        assert_eq!(
            validate_new_or_resized(&index, &footprint(30, 30, 50, 50), &world(), None, Some(root)),
            Err(ClaimError::SubdivisionOutOfParentBounds)
        );
        assert_eq!(
            validate_new_or_resized(&index, &footprint(5, 5, 15, 15), &world(), None, Some(root)),
            Err(ClaimError::RegionOverlap(first))
        );
        assert_eq!(
            validate_new_or_resized(&index, &footprint(10, 10, 15, 15), &world(), None, Some(root)),
            Ok(())
        );
    }

    #[test]
    fn test_children_must_fit_resize() {
        let mut index = RegionIndex::new();
        let root = add(&mut index, footprint(0, 0, 40, 40), None);
        let child = add(&mut index, footprint(30, 30, 35, 35), Some(root));

        assert_eq!(check_children_fit(&index, root, &footprint(0, 0, 35, 35)), Ok(()));
        assert_eq!(
            check_children_fit(&index, root, &footprint(0, 0, 32, 40)),
            Err(ClaimError::SubdivisionOutsideResize(child))
        );
    }
}
