//! Trust resolution.
//!
//! Pure functions over the index: no locking, no logging, no side effects.

use crate::{
    ActorId, Capabilities, Capability, ClaimsMode, Denial, Grantee, Region, RegionIndex, TrustTier,
};

/// Read-only view the resolver works against.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub index: &'a RegionIndex,
    pub capabilities: &'a dyn Capabilities,
}

impl<'a> ResolveContext<'a> {
    #[must_use]
    pub const fn new(index: &'a RegionIndex, capabilities: &'a dyn Capabilities) -> Self {
        Self {
            index,
            capabilities,
        }
    }

    fn matches(&self, actor: ActorId, grantee: &Grantee) -> bool {
        match grantee {
            Grantee::Player(player) => *player == actor,
            Grantee::Public => true,
            Grantee::ExternalNode(node) => self.capabilities.has_permission_node(actor, node),
        }
    }
}

/// Decide whether `actor` holds `tier` in `region`.
///
/// First match wins:
/// 1. `IgnoreClaims` capability
/// 2. administrative region: `AdminClaims` allows all; otherwise Manage and Edit are refused
/// 3. effective owner
/// 4. managers (up to Manage)
/// 5. the region's own table, cumulative by tier
/// 6. the parent chain, unless the subdivision restricts itself to explicit grants
pub fn resolve(
    ctx: &ResolveContext<'_>,
    actor: ActorId,
    region: &Region,
    tier: TrustTier,
) -> Result<(), Denial> {
    if ctx.capabilities.has_capability(actor, Capability::IgnoreClaims) {
        return Ok(());
    }

    let owner = ctx.index.effective_owner(region);
    match owner {
        None => {
            if ctx.capabilities.has_capability(actor, Capability::AdminClaims) {
                return Ok(());
            }
            if tier >= TrustTier::Manage {
                return Err(Denial::AdminClaimsRequired);
            }
        }
        Some(owner) if owner == actor => return Ok(()),
        Some(_) => {}
    }

    if tier == TrustTier::Edit {
        return Err(Denial::for_tier(tier, owner));
    }

    if granted_along_chain(ctx, actor, region, tier) {
        Ok(())
    } else {
        Err(Denial::for_tier(tier, owner))
    }
}

fn granted_along_chain(
    ctx: &ResolveContext<'_>,
    actor: ActorId,
    region: &Region,
    tier: TrustTier,
) -> bool {
    let mut current = region;
    loop {
        if current.managers.iter().any(|grantee| ctx.matches(actor, grantee)) {
            return true;
        }
        if tier <= TrustTier::Build
            && current
                .permissions
                .iter()
                .any(|(grantee, granted)| granted.implies(tier) && ctx.matches(actor, grantee))
        {
            return true;
        }
        if current.restrict_subclaim_to_explicit {
            return false;
        }
        match current.parent.and_then(|parent| ctx.index.get(parent)) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// Trust rule for unclaimed land in a world running `mode`.
pub fn resolve_wilderness(mode: ClaimsMode, tier: TrustTier) -> Result<(), Denial> {
    if mode == ClaimsMode::SurvivalRequiringClaims && tier >= TrustTier::Build {
        return Err(Denial::BuildOutsideClaims);
    }
    Ok(())
}
