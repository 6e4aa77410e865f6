//! Region arena with per-world spatial lookup.
//!
//! Only top-level regions are bucketed in the world grids; subdivisions are
//! reached by descending from their root, which keeps grid buckets free of
//! nested (and therefore overlapping) entries.

use claim_spatial::{BlockPos, Bounds, SpatialGrid};
use hashbrown::HashMap;
use tracing::trace;

use crate::{ActorId, ClaimError, ClaimResult, Region, RegionId, WorldId};

#[derive(Debug, Default, Clone)]
pub struct RegionIndex {
    regions: HashMap<RegionId, Region>,
    worlds: HashMap<WorldId, SpatialGrid<RegionId>>,
    /// Last allocated id; ids start at 1.
    last_id: u64,
}

impl RegionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn allocate_id(&mut self) -> RegionId {
        self.last_id += 1;
        RegionId::from_raw(self.last_id)
    }

    #[must_use]
    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        self.regions.get_mut(&id)
    }

    pub(crate) fn require(&self, id: RegionId) -> ClaimResult<&Region> {
        self.get(id).ok_or(ClaimError::RegionNotFound(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// All registered regions, sorted by id.
    #[must_use]
    pub fn sorted(&self) -> Vec<&Region> {
        let mut regions: Vec<&Region> = self.regions.values().collect();
        regions.sort_unstable_by_key(|region| region.id);
        regions
    }

    /// Top-level regions of `world`, sorted by id.
    #[must_use]
    pub fn top_level_in(&self, world: &WorldId) -> Vec<RegionId> {
        let mut ids: Vec<RegionId> = self
            .regions
            .values()
            .filter(|region| region.parent.is_none() && region.world == *world)
            .map(|region| region.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Top-level regions owned by `actor`, sorted by id.
    #[must_use]
    pub fn regions_owned_by(&self, actor: ActorId) -> Vec<RegionId> {
        let mut ids: Vec<RegionId> = self
            .regions
            .values()
            .filter(|region| region.parent.is_none() && region.owner == Some(actor))
            .map(|region| region.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Outermost ancestor of `region` (itself when top-level).
    #[must_use]
    pub fn root_of<'a>(&'a self, region: &'a Region) -> &'a Region {
        let mut current = region;
        while let Some(parent) = current.parent.and_then(|id| self.regions.get(&id)) {
            current = parent;
        }
        current
    }

    /// Owner of the root region; `None` for administrative regions and their subdivisions.
    #[must_use]
    pub fn effective_owner(&self, region: &Region) -> Option<ActorId> {
        self.root_of(region).owner
    }

    #[must_use]
    pub fn is_administrative(&self, region: &Region) -> bool {
        self.effective_owner(region).is_none()
    }

    /// Deepest region containing `pos`, or `None` for wilderness.
    ///
    /// `hint` is checked first and only narrows the search; a stale or wrong
    /// hint falls back to the grid lookup.
    #[must_use]
    pub fn find_containing(
        &self,
        world: &WorldId,
        pos: BlockPos,
        ignore_height: bool,
        hint: Option<RegionId>,
    ) -> Option<RegionId> {
        if let Some(hinted) = hint.and_then(|id| self.regions.get(&id)) {
            if hinted.world == *world && self.chain_contains(hinted, pos, ignore_height) {
                trace!("hint hit {}", hinted.id);
                return Some(self.deepest_within(hinted, pos, ignore_height));
            }
            trace!("hint miss {}", hinted.id);
        }

        let grid = self.worlds.get(world)?;
        grid.candidates_at(pos.x, pos.z)
            .iter()
            .filter_map(|id| self.regions.get(id))
            .find(|region| region.bounds.contains(pos, ignore_height))
            .map(|region| self.deepest_within(region, pos, ignore_height))
    }

    /// Whether `region` and every ancestor contain `pos`, i.e. whether a
    /// lookup from the root could reach `region`.
    fn chain_contains(&self, region: &Region, pos: BlockPos, ignore_height: bool) -> bool {
        let mut current = Some(region);
        while let Some(region) = current {
            if !region.bounds.contains(pos, ignore_height) {
                return false;
            }
            current = region.parent.and_then(|id| self.regions.get(&id));
        }
        true
    }

    fn deepest_within(&self, region: &Region, pos: BlockPos, ignore_height: bool) -> RegionId {
        let mut current = region;
        while let Some(child) = current
            .children
            .iter()
            .filter_map(|id| self.regions.get(id))
            .find(|child| child.bounds.contains(pos, ignore_height))
        {
            current = child;
        }
        current.id
    }

    /// Top-level regions of `world` whose grid cells touch `bounds`, sorted by id.
    #[must_use]
    pub fn candidates_overlapping(&self, world: &WorldId, bounds: &Bounds) -> Vec<RegionId> {
        self.worlds
            .get(world)
            .map(|grid| grid.candidates_in(bounds))
            .unwrap_or_default()
    }

    /// Register a region. Its parent, if any, must already be registered.
    pub(crate) fn insert(&mut self, mut region: Region) -> ClaimResult<RegionId> {
        let id = region.id;
        match region.parent {
            Some(parent_id) => {
                let parent = self
                    .regions
                    .get_mut(&parent_id)
                    .ok_or(ClaimError::RegionNotFound(parent_id))?;
                if let Err(at) = parent.children.binary_search(&id) {
                    parent.children.insert(at, id);
                }
            }
            None => {
                self.worlds
                    .entry(region.world.clone())
                    .or_default()
                    .insert(id, &region.bounds);
            }
        }
        self.last_id = self.last_id.max(id.as_raw());
        region.registered = true;
        self.regions.insert(id, region);
        Ok(id)
    }

    /// Replace a region's bounds, keeping the world grid in step.
    pub(crate) fn set_bounds(&mut self, id: RegionId, bounds: Bounds) -> ClaimResult<()> {
        let region = self
            .regions
            .get_mut(&id)
            .ok_or(ClaimError::RegionNotFound(id))?;
        let old = std::mem::replace(&mut region.bounds, bounds);
        if region.parent.is_none() {
            if let Some(grid) = self.worlds.get_mut(&region.world) {
                grid.remove(id, &old);
                grid.insert(id, &bounds);
            }
        }
        Ok(())
    }

    /// Remove `id` and all of its descendants.
    ///
    /// Returned regions are unregistered, the requested region first.
    pub(crate) fn remove(&mut self, id: RegionId) -> Vec<Region> {
        let Some(mut region) = self.regions.remove(&id) else {
            return Vec::new();
        };
        region.registered = false;

        match region.parent {
            Some(parent_id) => {
                if let Some(parent) = self.regions.get_mut(&parent_id) {
                    parent.children.retain(|child| *child != id);
                }
            }
            None => {
                if let Some(grid) = self.worlds.get_mut(&region.world) {
                    grid.remove(id, &region.bounds);
                }
            }
        }

        let children = region.children.clone();
        let mut removed = vec![region];
        for child in children {
            removed.extend(self.remove(child));
        }
        removed
    }
}
