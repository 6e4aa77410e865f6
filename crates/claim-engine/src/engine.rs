//! The shared engine facade.

use std::sync::Arc;

use claim_spatial::BlockPos;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::{
    ActorId, Capabilities, Capability, ClaimConfig, ClaimError, ClaimResult, ClaimStore,
    ClaimsMode, Denial, Grantee, LedgerEntry, NoopStore, PolicyOverride, Region, RegionId,
    ResolveContext, TrustTier, WorldId,
    lifecycle::{
        Direction, EngineState, Lifecycle, NewRegion, RegionKind, TrustList, check_claim_count,
        claim_around_bounds,
    },
    permission::{resolve, resolve_wilderness},
    workflow::{self, CornerOutcome, PendingTarget, ShovelMode, Workflow, WorkflowState},
};

/// Land-claim engine. Construct once and share behind an [`Arc`].
///
/// Queries take the read guard; every mutation takes the write guard, so
/// concurrent creations over the same land yield exactly one success.
pub struct ClaimEngine {
    config: ClaimConfig,
    capabilities: Arc<dyn Capabilities>,
    store: Arc<dyn ClaimStore>,
    state: RwLock<EngineState>,
    /// Locked before `state` whenever both are needed.
    workflows: Mutex<HashMap<ActorId, Workflow>>,
}

impl ClaimEngine {
    #[must_use]
    pub fn new(config: ClaimConfig, capabilities: Arc<dyn Capabilities>) -> Self {
        let state = EngineState::new(&config);
        Self {
            config,
            capabilities,
            store: Arc::new(NoopStore),
            state: RwLock::new(state),
            workflows: Mutex::new(HashMap::new()),
        }
    }

    /// Attach persistence hooks.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ClaimStore>) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ClaimConfig {
        &self.config
    }

    fn mutate<T>(&self, op: impl FnOnce(&mut Lifecycle<'_>) -> T) -> T {
        let mut state = self.state.write();
        let mut lifecycle = Lifecycle {
            state: &mut state,
            config: &self.config,
            capabilities: self.capabilities.as_ref(),
            store: self.store.as_ref(),
        };
        op(&mut lifecycle)
    }

    /// Replace all state with a persisted snapshot.
    ///
    /// Fails without touching the current state if any region is corrupt.
    pub fn restore(
        &self,
        regions: Vec<Region>,
        ledger: Vec<(ActorId, LedgerEntry)>,
    ) -> ClaimResult<usize> {
        let restored = EngineState::restore(&self.config, regions, ledger)?;
        let count = restored.index.len();
        *self.state.write() = restored;
        self.workflows.lock().clear();
        info!("restored {count} regions");
        Ok(count)
    }

    // ---- queries ----

    #[must_use]
    pub fn find_containing(
        &self,
        world: &WorldId,
        pos: BlockPos,
        ignore_height: bool,
        hint: Option<RegionId>,
    ) -> Option<RegionId> {
        self.state
            .read()
            .index
            .find_containing(world, pos, ignore_height, hint)
    }

    /// Cloned snapshot of one region.
    #[must_use]
    pub fn region(&self, id: RegionId) -> Option<Region> {
        self.state.read().index.get(id).cloned()
    }

    /// Every region, sorted by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Region> {
        self.state
            .read()
            .index
            .sorted()
            .into_iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn regions_owned_by(&self, actor: ActorId) -> Vec<RegionId> {
        self.state.read().index.regions_owned_by(actor)
    }

    #[must_use]
    pub fn top_level_in(&self, world: &WorldId) -> Vec<RegionId> {
        self.state.read().index.top_level_in(world)
    }

    /// Trust check against a known region. A region that no longer exists
    /// protects nothing.
    pub fn resolve(
        &self,
        actor: ActorId,
        region: Option<RegionId>,
        tier: TrustTier,
    ) -> Result<(), Denial> {
        let state = self.state.read();
        let Some(region) = region.and_then(|id| state.index.get(id)) else {
            return Ok(());
        };
        let ctx = ResolveContext::new(&state.index, self.capabilities.as_ref());
        resolve(&ctx, actor, region, tier)
    }

    /// Trust check for an action at `pos`. `hint` is read as a lookup hint and
    /// updated with the region found.
    pub fn check_action(
        &self,
        actor: ActorId,
        world: &WorldId,
        pos: BlockPos,
        tier: TrustTier,
        hint: &mut Option<RegionId>,
    ) -> Result<(), Denial> {
        self.check_action_inner(actor, world, pos, tier, hint, None)
    }

    /// As [`ClaimEngine::check_action`], letting `policy` overturn a denial.
    pub fn check_action_with(
        &self,
        actor: ActorId,
        world: &WorldId,
        pos: BlockPos,
        tier: TrustTier,
        hint: &mut Option<RegionId>,
        policy: &dyn PolicyOverride,
    ) -> Result<(), Denial> {
        self.check_action_inner(actor, world, pos, tier, hint, Some(policy))
    }

    fn check_action_inner(
        &self,
        actor: ActorId,
        world: &WorldId,
        pos: BlockPos,
        tier: TrustTier,
        hint: &mut Option<RegionId>,
        policy: Option<&dyn PolicyOverride>,
    ) -> Result<(), Denial> {
        let mode = self.config.mode_for(world);
        if mode == ClaimsMode::Disabled
            || self
                .capabilities
                .has_capability(actor, Capability::IgnoreClaims)
        {
            return Ok(());
        }

        let state = self.state.read();
        let found = state.index.find_containing(world, pos, false, *hint);
        if found.is_some() {
            *hint = found;
        }
        let region = found.and_then(|id| state.index.get(id));

        let verdict = match region {
            Some(region) => {
                let ctx = ResolveContext::new(&state.index, self.capabilities.as_ref());
                resolve(&ctx, actor, region, tier)
            }
            None => resolve_wilderness(mode, tier),
        };

        match (verdict, policy) {
            (Err(_), Some(policy)) if policy.allows(actor, region, tier) => Ok(()),
            (verdict, _) => verdict,
        }
    }

    #[must_use]
    pub fn explosions_allowed_at(&self, world: &WorldId, pos: BlockPos) -> bool {
        if !self.config.block_claim_explosions || !self.config.claims_enabled(world) {
            return true;
        }
        let state = self.state.read();
        state
            .index
            .find_containing(world, pos, false, None)
            .and_then(|id| state.index.get(id))
            .is_none_or(|region| region.allow_explosions)
    }

    // ---- ledger ----

    #[must_use]
    pub fn remaining_blocks(&self, actor: ActorId) -> i64 {
        self.state
            .read()
            .ledger
            .remaining(actor, self.capabilities.as_ref())
    }

    #[must_use]
    pub fn ledger_entry(&self, actor: ActorId) -> LedgerEntry {
        self.state.read().ledger.entry(actor)
    }

    fn update_ledger<T>(
        &self,
        actor: ActorId,
        op: impl FnOnce(&mut crate::ClaimBlockLedger) -> T,
    ) -> T {
        let mut state = self.state.write();
        let out = op(&mut state.ledger);
        self.store.ledger_saved(actor, &state.ledger.entry(actor));
        out
    }

    /// Returns the new bonus.
    pub fn adjust_bonus_blocks(&self, actor: ActorId, delta: i64) -> i64 {
        let bonus = self.update_ledger(actor, |ledger| ledger.adjust_bonus(actor, delta));
        info!("bonus blocks of {actor} adjusted by {delta} to {bonus}");
        bonus
    }

    /// Add `delta` bonus blocks to every actor the ledger knows. Returns how many were adjusted.
    pub fn adjust_bonus_blocks_all(&self, delta: i64) -> usize {
        let mut state = self.state.write();
        let touched = state.ledger.adjust_bonus_all(delta);
        for actor in &touched {
            self.store.ledger_saved(*actor, &state.ledger.entry(*actor));
        }
        info!("bonus blocks of {} actors adjusted by {delta}", touched.len());
        touched.len()
    }

    /// Returns the node's new bonus.
    pub fn adjust_group_bonus(&self, node: &str, delta: i64) -> i64 {
        let bonus = self.state.write().ledger.adjust_group_bonus(node, delta);
        info!("group bonus of [{node}] adjusted by {delta} to {bonus}");
        bonus
    }

    /// Returns the new accrued total.
    pub fn accrue_blocks(&self, actor: ActorId, delta: i64) -> i64 {
        self.update_ledger(actor, |ledger| ledger.accrue(actor, delta))
    }

    pub fn set_accrued_blocks(&self, actor: ActorId, amount: i64) {
        self.update_ledger(actor, |ledger| ledger.set_accrued(actor, amount));
    }

    pub fn record_activity(&self, actor: ActorId, now: u64) {
        self.update_ledger(actor, |ledger| ledger.record_activity(actor, now));
    }

    // ---- lifecycle ----

    pub fn create_region(
        &self,
        actor: ActorId,
        request: NewRegion,
        now: u64,
    ) -> ClaimResult<RegionId> {
        self.mutate(|lifecycle| lifecycle.create(actor, request, now))
    }

    /// Square claim centred on `center`; `radius` defaults to the smallest
    /// square satisfying the minimum area.
    pub fn create_claim_around(
        &self,
        actor: ActorId,
        world: &WorldId,
        center: BlockPos,
        radius: Option<i32>,
        now: u64,
    ) -> ClaimResult<RegionId> {
        let bounds = claim_around_bounds(&self.config, center, radius)?;
        self.create_region(
            actor,
            NewRegion {
                world: world.clone(),
                bounds,
                kind: RegionKind::Claim,
            },
            now,
        )
    }

    pub fn resize_region(
        &self,
        actor: ActorId,
        id: RegionId,
        bounds: claim_spatial::Bounds,
    ) -> ClaimResult<()> {
        self.mutate(|lifecycle| lifecycle.resize(actor, id, bounds))
    }

    /// Move one side of the region by `amount` blocks; negative shrinks.
    pub fn extend_region(
        &self,
        actor: ActorId,
        id: RegionId,
        direction: Direction,
        amount: i32,
    ) -> ClaimResult<()> {
        self.mutate(|lifecycle| lifecycle.extend(actor, id, direction, amount))
    }

    /// Delete a region and its subdivisions. Returns every removed id.
    pub fn delete_region(&self, actor: ActorId, id: RegionId) -> ClaimResult<Vec<RegionId>> {
        self.mutate(|lifecycle| lifecycle.delete(actor, id))
    }

    pub fn abandon_all(&self, actor: ActorId) -> ClaimResult<Vec<RegionId>> {
        self.mutate(|lifecycle| lifecycle.abandon_all(actor))
    }

    pub fn delete_all_of(
        &self,
        admin: ActorId,
        owner: Option<ActorId>,
    ) -> ClaimResult<Vec<RegionId>> {
        self.mutate(|lifecycle| lifecycle.delete_all_of(admin, owner))
    }

    /// Hand a top-level region to `new_owner`; `None` makes it administrative.
    /// Delete every top-level region in `world`, keeping administrative ones
    /// unless `include_admin` is set.
    pub fn delete_claims_in_world(
        &self,
        admin: ActorId,
        world: &WorldId,
        include_admin: bool,
    ) -> ClaimResult<Vec<RegionId>> {
        self.mutate(|lifecycle| lifecycle.delete_claims_in_world(admin, world, include_admin))
    }

    pub fn transfer_owner(
        &self,
        actor: ActorId,
        id: RegionId,
        new_owner: Option<ActorId>,
    ) -> ClaimResult<()> {
        self.mutate(|lifecycle| lifecycle.transfer(actor, id, new_owner))
    }

    pub fn set_permission(
        &self,
        actor: ActorId,
        id: RegionId,
        tier: TrustTier,
        grantee: Grantee,
    ) -> ClaimResult<()> {
        self.mutate(|lifecycle| lifecycle.set_permission(actor, id, tier, grantee))
    }

    pub fn remove_permission(
        &self,
        actor: ActorId,
        id: RegionId,
        grantee: &Grantee,
    ) -> ClaimResult<bool> {
        self.mutate(|lifecycle| lifecycle.remove_permission(actor, id, grantee))
    }

    pub fn clear_permissions(&self, actor: ActorId, id: RegionId) -> ClaimResult<()> {
        self.mutate(|lifecycle| lifecycle.clear_permissions(actor, id))
    }

    pub fn set_permission_on_all_owned(
        &self,
        actor: ActorId,
        tier: TrustTier,
        grantee: &Grantee,
    ) -> ClaimResult<usize> {
        self.mutate(|lifecycle| lifecycle.set_permission_on_all_owned(actor, tier, grantee))
    }

    pub fn trust_list(&self, actor: ActorId, id: RegionId) -> ClaimResult<TrustList> {
        let state = self.state.read();
        let region = state.index.require(id)?;
        let ctx = ResolveContext::new(&state.index, self.capabilities.as_ref());
        resolve(&ctx, actor, region, TrustTier::Manage)
            .map_err(|reason| ClaimError::denied(TrustTier::Manage, reason))?;
        Ok(TrustList::of(region))
    }

    pub fn set_allow_explosions(
        &self,
        actor: ActorId,
        id: RegionId,
        allow: bool,
    ) -> ClaimResult<()> {
        self.mutate(|lifecycle| lifecycle.set_allow_explosions(actor, id, allow))
    }

    pub fn set_subclaim_restriction(
        &self,
        actor: ActorId,
        id: RegionId,
        restrict: bool,
    ) -> ClaimResult<()> {
        self.mutate(|lifecycle| lifecycle.set_subclaim_restriction(actor, id, restrict))
    }

    /// Maintenance sweep. Returns the removed region ids.
    pub fn expire_inactive(&self, now: u64) -> Vec<RegionId> {
        let removed = self.mutate(|lifecycle| lifecycle.expire_inactive(now));
        if !removed.is_empty() {
            info!("expiration sweep removed {} regions", removed.len());
        }
        removed
    }

    // ---- corner workflow ----

    /// Switch tool mode, discarding any pending corner.
    pub fn begin_region_workflow(&self, actor: ActorId, mode: ShovelMode) {
        let mut workflows = self.workflows.lock();
        let workflow = workflows.entry(actor).or_default();
        workflow.mode = mode;
        workflow.state = WorkflowState::Idle;
        debug!("{actor} switched to {mode:?} mode");
    }

    /// Discard the pending corner.
    pub fn cancel_workflow(&self, actor: ActorId) -> ClaimResult<()> {
        let mut workflows = self.workflows.lock();
        let workflow = workflows
            .get_mut(&actor)
            .filter(|workflow| workflow.state != WorkflowState::Idle)
            .ok_or(ClaimError::NoPendingWorkflow)?;
        workflow.state = WorkflowState::Idle;
        debug!("{actor} cancelled pending corner");
        Ok(())
    }

    #[must_use]
    pub fn workflow_state(&self, actor: ActorId) -> WorkflowState {
        self.workflows
            .lock()
            .get(&actor)
            .map(|workflow| workflow.state.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn workflow_mode(&self, actor: ActorId) -> ShovelMode {
        self.workflows
            .lock()
            .get(&actor)
            .map(|workflow| workflow.mode)
            .unwrap_or_default()
    }

    /// Designate a corner. The first call records it, the second commits.
    ///
    /// Any error leaves the workflow idle.
    pub fn set_corner(
        &self,
        actor: ActorId,
        world: &WorldId,
        pos: BlockPos,
        now: u64,
    ) -> ClaimResult<CornerOutcome> {
        let mut workflows = self.workflows.lock();
        let workflow = workflows.entry(actor).or_default();
        let pending = std::mem::take(&mut workflow.state);

        let WorkflowState::FirstCornerSet {
            world: first_world,
            corner,
            target,
        } = pending
        else {
            return self.first_corner(actor, workflow, world, pos);
        };

        if first_world != *world {
            return self.first_corner(actor, workflow, world, pos);
        }

        let result = match target {
            PendingTarget::Resize { region } => {
                if corner == pos {
                    workflow.state = WorkflowState::FirstCornerSet {
                        world: first_world,
                        corner,
                        target,
                    };
                    return Ok(CornerOutcome::Ignored);
                }
                self.mutate(|lifecycle| {
                    let current = *lifecycle
                        .state
                        .index
                        .get(region)
                        .ok_or(ClaimError::StaleWorkflowState(region))?
                        .bounds();
                    let bounds = workflow::resized_bounds(&current, corner, pos, lifecycle.config);
                    lifecycle.resize(actor, region, bounds).map(|()| region)
                })
            }
            PendingTarget::NewClaim | PendingTarget::NewAdminClaim | PendingTarget::Subdivision { .. } => {
                let kind = match target {
                    PendingTarget::NewAdminClaim => RegionKind::Administrative,
                    PendingTarget::Subdivision { parent } => RegionKind::Subdivision { parent },
                    _ => RegionKind::Claim,
                };
                let bounds = workflow::new_region_bounds(corner, pos, &self.config);
                self.mutate(|lifecycle| {
                    if let RegionKind::Subdivision { parent } = kind {
                        if lifecycle.state.index.get(parent).is_none() {
                            return Err(ClaimError::StaleWorkflowState(parent));
                        }
                    }
                    lifecycle.create(
                        actor,
                        NewRegion {
                            world: first_world,
                            bounds,
                            kind,
                        },
                        now,
                    )
                })
            }
        };

        match result {
            Ok(id) => Ok(CornerOutcome::Committed(id)),
            Err(err) => {
                debug!("{actor} corner at {pos} rejected: {err}");
                Err(err)
            }
        }
    }

    fn first_corner(
        &self,
        actor: ActorId,
        workflow: &mut Workflow,
        world: &WorldId,
        pos: BlockPos,
    ) -> ClaimResult<CornerOutcome> {
        let state = self.state.read();
        let capabilities = self.capabilities.as_ref();

        let target = match state.index.find_containing(world, pos, true, None) {
            Some(id) => {
                let region = state.index.require(id)?;
                let ctx = ResolveContext::new(&state.index, capabilities);
                let may_edit = resolve(&ctx, actor, region, TrustTier::Edit).is_ok();
                if may_edit && region.bounds.is_footprint_corner(pos.x, pos.z) {
                    PendingTarget::Resize { region: id }
                } else if may_edit && workflow.mode == ShovelMode::Subdivide {
                    PendingTarget::Subdivision { parent: id }
                } else {
                    debug!("{actor} corner at {pos} lands in {id}");
                    return Err(ClaimError::RegionOverlap(id));
                }
            }
            None => {
                if !self.config.claims_enabled(world) {
                    return Err(ClaimError::ClaimsDisabled(world.clone()));
                }
                if workflow.mode == ShovelMode::Admin {
                    if !capabilities.has_capability(actor, Capability::AdminClaims) {
                        return Err(ClaimError::denied(
                            TrustTier::Edit,
                            Denial::AdminClaimsRequired,
                        ));
                    }
                    PendingTarget::NewAdminClaim
                } else {
                    check_claim_count(&state.index, &self.config, capabilities, actor)?;
                    PendingTarget::NewClaim
                }
            }
        };

        workflow.state = WorkflowState::FirstCornerSet {
            world: world.clone(),
            corner: pos,
            target,
        };
        debug!("{actor} set first corner at {pos} for {target:?}");
        Ok(CornerOutcome::Pending(target))
    }
}
