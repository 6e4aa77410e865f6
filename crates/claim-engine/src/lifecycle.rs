//! Region lifecycle: every mutation of the index and ledger.
//!
//! A [`Lifecycle`] borrows the engine state mutably, so it only exists while
//! the engine holds its write guard. Reservation, validation and insertion
//! therefore commit or roll back as one step.

use claim_spatial::{BlockPos, Bounds};
use hashbrown::HashMap;
use tracing::{debug, error, info, warn};

use crate::{
    ActorId, Capabilities, Capability, ClaimBlockLedger, ClaimConfig, ClaimError, ClaimResult,
    ClaimStore, Denial, Grantee, LedgerEntry, Region, RegionId, RegionIndex, ResolveContext,
    SizeViolation, TrustTier, WorldId,
    overlap::{check_children_fit, check_size, validate_new_or_resized},
    permission::resolve,
};

/// Everything guarded by the engine's write lock.
#[derive(Debug, Clone, Default)]
pub(crate) struct EngineState {
    pub index: RegionIndex,
    pub ledger: ClaimBlockLedger,
}

impl EngineState {
    pub fn new(config: &ClaimConfig) -> Self {
        let mut ledger = ClaimBlockLedger::new(config.initial_blocks, config.max_accrued_blocks);
        for (node, bonus) in &config.group_bonus {
            ledger.adjust_group_bonus(node, *bonus);
        }
        Self {
            index: RegionIndex::new(),
            ledger,
        }
    }

    /// Rebuild state from persisted regions and ledger rows.
    ///
    /// Child lists and `spent` totals are recomputed from the regions.
    pub fn restore(
        config: &ClaimConfig,
        mut regions: Vec<Region>,
        entries: Vec<(ActorId, LedgerEntry)>,
    ) -> ClaimResult<Self> {
        let mut state = Self::new(config);

        // Parents are always older than their children.
        regions.sort_unstable_by_key(|region| region.id);
        for mut region in regions {
            if !region.bounds.is_well_formed() {
                error!("refusing to restore {}: corrupt bounds {:?}", region.id, region.bounds);
                return Err(ClaimError::CorruptBounds(region.id));
            }
            region.children.clear();
            if region.parent.is_some() {
                region.owner = None;
            }
            state.index.insert(region)?;
        }

        for (actor, entry) in entries {
            state.ledger.restore_entry(actor, entry);
        }

        let mut spent: HashMap<ActorId, i64> = HashMap::new();
        for region in state.index.sorted() {
            if let (None, Some(owner)) = (region.parent, region.owner) {
                *spent.entry(owner).or_insert(0) += region.area();
            }
        }
        state.ledger.reset_spent(&spent);

        Ok(state)
    }
}

/// What a new region will be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    /// Top-level claim owned by the creating actor.
    Claim,
    /// Top-level claim without an owner.
    Administrative,
    Subdivision { parent: RegionId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRegion {
    /// Ignored for subdivisions, which live in their parent's world.
    pub world: WorldId,
    pub bounds: Bounds,
    pub kind: RegionKind,
}

/// Footprint side moved by `extend_region`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// -Z
    North,
    /// +Z
    South,
    /// +X
    East,
    /// -X
    West,
    /// Lowers the bottom.
    Down,
}

impl Direction {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "north" | "n" => Some(Self::North),
            "south" | "s" => Some(Self::South),
            "east" | "e" => Some(Self::East),
            "west" | "w" => Some(Self::West),
            "down" | "d" => Some(Self::Down),
            _ => None,
        }
    }
}

/// Grants on one region, grouped by tier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrustList {
    pub managers: Vec<Grantee>,
    pub build: Vec<Grantee>,
    pub inventory: Vec<Grantee>,
    pub access: Vec<Grantee>,
    /// Whether the parent's grants also apply.
    pub inherits_parent: bool,
}

impl TrustList {
    pub(crate) fn of(region: &Region) -> Self {
        let tier = |tier| region.permissions.grantees(tier).cloned().collect();
        Self {
            managers: region.managers.iter().cloned().collect(),
            build: tier(TrustTier::Build),
            inventory: tier(TrustTier::Inventory),
            access: tier(TrustTier::Access),
            inherits_parent: region.parent.is_some() && !region.restrict_subclaim_to_explicit,
        }
    }
}

pub(crate) struct Lifecycle<'a> {
    pub state: &'a mut EngineState,
    pub config: &'a ClaimConfig,
    pub capabilities: &'a dyn Capabilities,
    pub store: &'a dyn ClaimStore,
}

impl Lifecycle<'_> {
    fn has(&self, actor: ActorId, capability: Capability) -> bool {
        self.capabilities.has_capability(actor, capability)
    }

    fn authorize(&self, actor: ActorId, id: RegionId, tier: TrustTier) -> ClaimResult<()> {
        let region = self.state.index.require(id)?;
        let ctx = ResolveContext::new(&self.state.index, self.capabilities);
        resolve(&ctx, actor, region, tier).map_err(|reason| ClaimError::denied(tier, reason))
    }

    fn save_region(&self, id: RegionId) {
        if let Some(region) = self.state.index.get(id) {
            self.store.region_saved(region);
        }
    }

    fn save_ledger(&self, actor: ActorId) {
        self.store.ledger_saved(actor, &self.state.ledger.entry(actor));
    }

    fn apply_depth_limit(&self, bounds: Bounds) -> Bounds {
        match self.config.max_depth {
            Some(depth) if bounds.min().y < depth => {
                bounds.with_y_range(depth, bounds.max().y.max(depth))
            }
            _ => bounds,
        }
    }

    pub fn create(&mut self, actor: ActorId, request: NewRegion, now: u64) -> ClaimResult<RegionId> {
        let NewRegion { world, bounds, kind } = request;
        let world = match kind {
            RegionKind::Subdivision { parent } => self.state.index.require(parent)?.world.clone(),
            RegionKind::Claim | RegionKind::Administrative => world,
        };
        if !self.config.claims_enabled(&world) {
            return Err(ClaimError::ClaimsDisabled(world));
        }

        let (owner, parent) = match kind {
            RegionKind::Claim => {
                check_claim_count(&self.state.index, self.config, self.capabilities, actor)?;
                (Some(actor), None)
            }
            RegionKind::Administrative => {
                if !self.has(actor, Capability::AdminClaims) {
                    return Err(ClaimError::denied(TrustTier::Edit, Denial::AdminClaimsRequired));
                }
                (None, None)
            }
            RegionKind::Subdivision { parent } => {
                self.authorize(actor, parent, TrustTier::Edit)?;
                (None, Some(parent))
            }
        };

        let bounds = self.apply_depth_limit(bounds);
        check_size(&bounds, self.config, owner.is_none())?;

        let area = bounds.area();
        if owner.is_some() {
            let overdraft = self.has(actor, Capability::OverrideClaimBlocks);
            self.state
                .ledger
                .reserve(actor, area, self.capabilities, overdraft)?;
        }

        if let Err(err) = validate_new_or_resized(&self.state.index, &bounds, &world, None, parent) {
            if owner.is_some() {
                self.state.ledger.release(actor, area, 1.0);
            }
            debug!("{actor} claim at {bounds} rejected: {err}");
            return Err(err);
        }

        let id = self.state.index.allocate_id();
        self.state
            .index
            .insert(Region::new(id, world, bounds, owner, parent, now))?;

        info!("{actor} created {id} at {bounds} ({kind:?})");
        self.save_region(id);
        if owner.is_some() {
            self.save_ledger(actor);
        }
        Ok(id)
    }

    pub fn resize(&mut self, actor: ActorId, id: RegionId, bounds: Bounds) -> ClaimResult<()> {
        self.authorize(actor, id, TrustTier::Edit)?;

        let region = self.state.index.require(id)?;
        let world = region.world.clone();
        let parent = region.parent;
        let old_area = region.area();
        // Only owned top-level regions are charged.
        let charged_to = if parent.is_none() { region.owner } else { None };

        let bounds = self.apply_depth_limit(bounds);
        check_size(&bounds, self.config, charged_to.is_none())?;
        check_children_fit(&self.state.index, id, &bounds)?;

        let delta = bounds.area() - old_area;
        let mut reserved = None;
        if let Some(owner) = charged_to {
            if delta > 0 {
                let overdraft = self.has(owner, Capability::OverrideClaimBlocks);
                self.state
                    .ledger
                    .reserve(owner, delta, self.capabilities, overdraft)?;
                reserved = Some(owner);
            }
        }

        if let Err(err) = validate_new_or_resized(&self.state.index, &bounds, &world, Some(id), parent) {
            if let Some(owner) = reserved {
                self.state.ledger.release(owner, delta, 1.0);
            }
            debug!("{actor} resize of {id} to {bounds} rejected: {err}");
            return Err(err);
        }

        if let Some(owner) = charged_to {
            if delta < 0 {
                self.state.ledger.release(owner, -delta, 1.0);
            }
        }
        self.state.index.set_bounds(id, bounds)?;

        info!("{actor} resized {id} to {bounds}");
        self.save_region(id);
        if let Some(owner) = charged_to {
            if delta != 0 {
                self.save_ledger(owner);
            }
        }
        Ok(())
    }

    pub fn extend(
        &mut self,
        actor: ActorId,
        id: RegionId,
        direction: Direction,
        amount: i32,
    ) -> ClaimResult<()> {
        let current = *self.state.index.require(id)?.bounds();
        let (min, max) = (current.min(), current.max());
        let shifted = match direction {
            Direction::North => min.z.checked_sub(amount).map(|z| (BlockPos { z, ..min }, max)),
            Direction::South => max.z.checked_add(amount).map(|z| (min, BlockPos { z, ..max })),
            Direction::East => max.x.checked_add(amount).map(|x| (min, BlockPos { x, ..max })),
            Direction::West => min.x.checked_sub(amount).map(|x| (BlockPos { x, ..min }, max)),
            Direction::Down => min.y.checked_sub(amount).map(|y| (BlockPos { y, ..min }, max)),
        };
        let (min, max) = shifted.ok_or(ClaimError::CoordinateOutOfRange)?;
        let bounds = Bounds::try_new(min, max).ok_or(ClaimError::RegionTooSmall(
            SizeViolation::TooNarrow {
                min_width: self.config.min_width,
            },
        ))?;
        self.resize(actor, id, bounds)
    }

    /// Remove `id` and its descendants, refunding a top-level owner at `ratio`.
    fn remove_and_refund(&mut self, id: RegionId, ratio: f64) -> Vec<RegionId> {
        let refund = self
            .state
            .index
            .get(id)
            .filter(|region| region.parent.is_none())
            .and_then(|region| region.owner.map(|owner| (owner, region.area())));

        let removed: Vec<RegionId> = self
            .state
            .index
            .remove(id)
            .iter()
            .map(Region::id)
            .collect();

        if let Some((owner, area)) = refund {
            let penalty = self.state.ledger.release(owner, area, ratio);
            if penalty > 0 {
                debug!("{owner} forfeited {penalty} claim blocks abandoning {id}");
            }
            self.save_ledger(owner);
        }
        for removed_id in &removed {
            self.store.region_removed(*removed_id);
        }
        removed
    }

    pub fn delete(&mut self, actor: ActorId, id: RegionId) -> ClaimResult<Vec<RegionId>> {
        let region = self.state.index.require(id)?;
        let administrative = self.state.index.is_administrative(region);
        let self_abandon = region.parent.is_none() && region.owner == Some(actor);

        let admin_delete = self.has(actor, Capability::DeleteClaims)
            && (!administrative || self.has(actor, Capability::AdminClaims));
        if !admin_delete {
            self.authorize(actor, id, TrustTier::Edit)?;
        }

        let ratio = if self_abandon {
            self.config.abandon_return_ratio
        } else {
            1.0
        };
        let removed = self.remove_and_refund(id, ratio);
        info!("{actor} deleted {id} ({} regions removed)", removed.len());
        Ok(removed)
    }

    pub fn abandon_all(&mut self, actor: ActorId) -> ClaimResult<Vec<RegionId>> {
        let mut removed = Vec::new();
        for id in self.state.index.regions_owned_by(actor) {
            removed.extend(self.delete(actor, id)?);
        }
        Ok(removed)
    }

    /// Delete every top-level region of `owner`; `None` targets administrative regions.
    pub fn delete_all_of(
        &mut self,
        admin: ActorId,
        owner: Option<ActorId>,
    ) -> ClaimResult<Vec<RegionId>> {
        if !self.has(admin, Capability::DeleteClaims) {
            return Err(ClaimError::denied(
                TrustTier::Edit,
                Denial::for_tier(TrustTier::Edit, owner),
            ));
        }
        if owner.is_none() && !self.has(admin, Capability::AdminClaims) {
            return Err(ClaimError::denied(TrustTier::Edit, Denial::AdminClaimsRequired));
        }

        let targets: Vec<RegionId> = self
            .state
            .index
            .sorted()
            .into_iter()
            .filter(|region| region.parent.is_none() && region.owner == owner)
            .map(Region::id)
            .collect();

        let mut removed = Vec::new();
        for id in targets {
            removed.extend(self.remove_and_refund(id, 1.0));
        }
        info!("{admin} deleted all regions of {owner:?} ({} removed)", removed.len());
        Ok(removed)
    }

    pub fn delete_claims_in_world(
        &mut self,
        admin: ActorId,
        world: &WorldId,
        include_admin: bool,
    ) -> ClaimResult<Vec<RegionId>> {
        if !self.has(admin, Capability::DeleteClaims) {
            return Err(ClaimError::denied(TrustTier::Edit, Denial::AdminClaimsRequired));
        }
        if include_admin && !self.has(admin, Capability::AdminClaims) {
            return Err(ClaimError::denied(TrustTier::Edit, Denial::AdminClaimsRequired));
        }

        let targets: Vec<RegionId> = self
            .state
            .index
            .top_level_in(world)
            .into_iter()
            .filter(|id| {
                include_admin
                    || self
                        .state
                        .index
                        .get(*id)
                        .is_some_and(|region| region.owner.is_some())
            })
            .collect();

        let mut removed = Vec::new();
        for id in targets {
            removed.extend(self.remove_and_refund(id, 1.0));
        }
        info!("{admin} deleted all claims in {world} ({} removed)", removed.len());
        Ok(removed)
    }

    pub fn transfer(
        &mut self,
        actor: ActorId,
        id: RegionId,
        new_owner: Option<ActorId>,
    ) -> ClaimResult<()> {
        let region = self.state.index.require(id)?;
        if region.parent.is_some() || region.owner == new_owner {
            return Err(ClaimError::InvalidTransferTarget);
        }
        let old_owner = region.owner;
        let area = region.area();

        self.authorize(actor, id, TrustTier::Edit)?;
        if (old_owner.is_none() || new_owner.is_none()) && !self.has(actor, Capability::AdminClaims)
        {
            return Err(ClaimError::denied(TrustTier::Edit, Denial::AdminClaimsRequired));
        }

        if let Some(old) = old_owner {
            self.state.ledger.release(old, area, 1.0);
        }
        if let Some(new) = new_owner {
            self.state.ledger.charge(new, area);
        }
        if let Some(region) = self.state.index.get_mut(id) {
            region.owner = new_owner;
        }

        info!("{actor} transferred {id} from {old_owner:?} to {new_owner:?}");
        self.save_region(id);
        for owner in [old_owner, new_owner].into_iter().flatten() {
            self.save_ledger(owner);
        }
        Ok(())
    }

    pub fn set_permission(
        &mut self,
        actor: ActorId,
        id: RegionId,
        tier: TrustTier,
        grantee: Grantee,
    ) -> ClaimResult<()> {
        match tier {
            TrustTier::Edit => return Err(ClaimError::UngrantableTier(tier)),
            TrustTier::Manage => self.authorize(actor, id, TrustTier::Edit)?,
            // Holding Manage implies holding every table tier.
            TrustTier::Access | TrustTier::Inventory | TrustTier::Build => {
                self.authorize(actor, id, TrustTier::Manage)?;
            }
        }

        let region = self
            .state
            .index
            .get_mut(id)
            .ok_or(ClaimError::RegionNotFound(id))?;
        if tier == TrustTier::Manage {
            region.managers.insert(grantee.clone());
        } else {
            region.permissions.set(grantee.clone(), tier);
        }

        info!("{actor} granted {tier} on {id} to {grantee}");
        self.save_region(id);
        Ok(())
    }

    /// Drop every grant `grantee` holds on `id`. Returns whether anything was removed.
    pub fn remove_permission(
        &mut self,
        actor: ActorId,
        id: RegionId,
        grantee: &Grantee,
    ) -> ClaimResult<bool> {
        self.authorize(actor, id, TrustTier::Manage)?;
        if self.state.index.require(id)?.managers.contains(grantee) {
            self.authorize(actor, id, TrustTier::Edit)?;
        }

        let region = self
            .state
            .index
            .get_mut(id)
            .ok_or(ClaimError::RegionNotFound(id))?;
        let was_manager = region.managers.remove(grantee);
        let had_tier = region.permissions.remove(grantee).is_some();
        let changed = was_manager || had_tier;

        if changed {
            info!("{actor} removed {grantee} from {id}");
            self.save_region(id);
        }
        Ok(changed)
    }

    pub fn clear_permissions(&mut self, actor: ActorId, id: RegionId) -> ClaimResult<()> {
        self.authorize(actor, id, TrustTier::Edit)?;
        let region = self
            .state
            .index
            .get_mut(id)
            .ok_or(ClaimError::RegionNotFound(id))?;
        region.permissions.clear();
        region.managers.clear();

        info!("{actor} cleared permissions on {id}");
        self.save_region(id);
        Ok(())
    }

    /// Grant `tier` on every top-level region `actor` owns. Returns how many were updated.
    pub fn set_permission_on_all_owned(
        &mut self,
        actor: ActorId,
        tier: TrustTier,
        grantee: &Grantee,
    ) -> ClaimResult<usize> {
        let owned = self.state.index.regions_owned_by(actor);
        for id in &owned {
            self.set_permission(actor, *id, tier, grantee.clone())?;
        }
        Ok(owned.len())
    }

    pub fn set_allow_explosions(
        &mut self,
        actor: ActorId,
        id: RegionId,
        allow: bool,
    ) -> ClaimResult<()> {
        self.authorize(actor, id, TrustTier::Build)?;
        if let Some(region) = self.state.index.get_mut(id) {
            region.allow_explosions = allow;
        }
        debug!("{actor} set explosions on {id} to {allow}");
        self.save_region(id);
        Ok(())
    }

    pub fn set_subclaim_restriction(
        &mut self,
        actor: ActorId,
        id: RegionId,
        restrict: bool,
    ) -> ClaimResult<()> {
        if !self.state.index.require(id)?.is_subdivision() {
            return Err(ClaimError::NotASubdivision(id));
        }
        self.authorize(actor, id, TrustTier::Edit)?;
        if let Some(region) = self.state.index.get_mut(id) {
            region.restrict_subclaim_to_explicit = restrict;
        }
        debug!("{actor} set explicit-only trust on {id} to {restrict}");
        self.save_region(id);
        Ok(())
    }

    fn exempt_from_expiration(&self, entry: &LedgerEntry) -> bool {
        let total = self.config.expiration_exempt_total_blocks;
        let bonus = self.config.expiration_exempt_bonus_blocks;
        (total > 0 && entry.accrued + entry.bonus >= total) || (bonus > 0 && entry.bonus >= bonus)
    }

    /// Delete the claims of every actor inactive for longer than the expiration window.
    pub fn expire_inactive(&mut self, now: u64) -> Vec<RegionId> {
        let Some(window) = self.config.expiration_secs() else {
            return Vec::new();
        };
        let is_stale = |since: u64| now.saturating_sub(since) > window;

        let mut inactive: Vec<ActorId> = self
            .state
            .ledger
            .actors()
            .filter(|(_, entry)| entry.last_active.is_some_and(is_stale))
            .filter(|(_, entry)| !self.exempt_from_expiration(entry))
            .map(|(actor, _)| actor)
            .collect();
        inactive.sort_unstable();

        let mut removed = Vec::new();
        for actor in inactive {
            let expired: Vec<RegionId> = self
                .state
                .index
                .regions_owned_by(actor)
                .into_iter()
                .filter(|id| {
                    self.state
                        .index
                        .get(*id)
                        .is_some_and(|region| is_stale(region.created_at))
                })
                .collect();
            for id in expired {
                warn!("expiring {id} of inactive {actor}");
                removed.extend(self.remove_and_refund(id, 1.0));
            }
        }
        removed
    }
}

/// Refuse a new top-level claim once `actor` is at the per-player limit.
pub(crate) fn check_claim_count(
    index: &RegionIndex,
    config: &ClaimConfig,
    capabilities: &dyn Capabilities,
    actor: ActorId,
) -> ClaimResult<()> {
    let limit = config.max_claims_per_player;
    if limit == 0 || capabilities.has_capability(actor, Capability::OverrideClaimCountLimit) {
        return Ok(());
    }
    if index.regions_owned_by(actor).len() >= limit {
        return Err(ClaimError::ClaimCountLimit(limit));
    }
    Ok(())
}

/// Bounds of the `/claim [radius]` square around `center`.
pub(crate) fn claim_around_bounds(
    config: &ClaimConfig,
    center: BlockPos,
    radius: Option<i32>,
) -> ClaimResult<Bounds> {
    let min_radius = config.default_claim_radius();
    let radius = radius.unwrap_or(min_radius);
    if radius < min_radius {
        return Err(ClaimError::RegionTooSmall(SizeViolation::RadiusTooSmall {
            min_radius,
        }));
    }
    crate::workflow::square_around(center, radius, config)
        .ok_or(ClaimError::CoordinateOutOfRange)
}
