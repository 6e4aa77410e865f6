//! Collaborator traits implemented by the host.

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{ActorId, LedgerEntry, Region, RegionId, TrustTier};

/// Host-granted capabilities that bypass or extend normal trust rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Every trust check passes.
    IgnoreClaims,
    /// Full control of administrative regions; may create them.
    AdminClaims,
    /// May delete other actors' claims.
    DeleteClaims,
    /// Not bound by `max_claims_per_player`.
    OverrideClaimCountLimit,
    /// Claim-block reservations may drive `remaining` negative.
    OverrideClaimBlocks,
}

/// Capability and permission-node evaluator.
pub trait Capabilities: Send + Sync {
    fn has_capability(&self, actor: ActorId, capability: Capability) -> bool;

    /// Whether `actor` holds the external permission node `node`.
    fn has_permission_node(&self, actor: ActorId, node: &str) -> bool;
}

/// Persistence hooks, invoked after each committed mutation while the engine
/// still holds its write guard. Implementations must not block.
pub trait ClaimStore: Send + Sync {
    fn region_saved(&self, region: &Region);
    fn region_removed(&self, id: RegionId);
    fn ledger_saved(&self, actor: ActorId, entry: &LedgerEntry);
}

/// Store that drops every change.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

impl ClaimStore for NoopStore {
    fn region_saved(&self, _region: &Region) {}

    fn region_removed(&self, _id: RegionId) {}

    fn ledger_saved(&self, _actor: ActorId, _entry: &LedgerEntry) {}
}

/// Host policy consulted after a denial, e.g. letting mobs attack villagers
/// inside claims. It can only turn a denial into an allow.
pub trait PolicyOverride {
    fn allows(&self, actor: ActorId, region: Option<&Region>, tier: TrustTier) -> bool;
}

impl<F> PolicyOverride for F
where
    F: Fn(ActorId, Option<&Region>, TrustTier) -> bool,
{
    fn allows(&self, actor: ActorId, region: Option<&Region>, tier: TrustTier) -> bool {
        self(actor, region, tier)
    }
}

/// In-memory [`Capabilities`] backed by explicit grants.
#[derive(Debug, Default)]
pub struct CapabilityTable {
    capabilities: RwLock<HashMap<ActorId, HashSet<Capability>>>,
    nodes: RwLock<HashMap<ActorId, HashSet<String>>>,
}

impl CapabilityTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, actor: ActorId, capability: Capability) {
        self.capabilities
            .write()
            .entry(actor)
            .or_default()
            .insert(capability);
    }

    pub fn revoke(&self, actor: ActorId, capability: Capability) {
        if let Some(held) = self.capabilities.write().get_mut(&actor) {
            held.remove(&capability);
        }
    }

    pub fn grant_node(&self, actor: ActorId, node: impl Into<String>) {
        self.nodes.write().entry(actor).or_default().insert(node.into());
    }
}

impl Capabilities for CapabilityTable {
    fn has_capability(&self, actor: ActorId, capability: Capability) -> bool {
        self.capabilities
            .read()
            .get(&actor)
            .is_some_and(|held| held.contains(&capability))
    }

    fn has_permission_node(&self, actor: ActorId, node: &str) -> bool {
        self.nodes
            .read()
            .get(&actor)
            .is_some_and(|held| held.contains(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_table() {
        let table = CapabilityTable::new();
        let alice = ActorId::from_u128(1);

        assert!(!table.has_capability(alice, Capability::AdminClaims));
        table.grant(alice, Capability::AdminClaims);
        assert!(table.has_capability(alice, Capability::AdminClaims));
        table.revoke(alice, Capability::AdminClaims);
        assert!(!table.has_capability(alice, Capability::AdminClaims));

        table.grant_node(alice, "group.vip");
        assert!(table.has_permission_node(alice, "group.vip"));
        assert!(!table.has_permission_node(alice, "group.staff"));
    }
}
