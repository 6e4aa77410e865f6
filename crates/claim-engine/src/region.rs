//! Regions, trust tiers and per-region permission tables.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use claim_spatial::{BlockPos, Bounds};
use serde::{Deserialize, Serialize};

use crate::{ActorId, WorldId};

/// Stable region identifier. Allocated monotonically and never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(u64);

impl RegionId {
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Region#{}", self.0)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordered trust levels. Holding a tier implies every lower tier.
///
/// `Edit` is never granted through a permission table; it belongs to the
/// owner of the outermost region (or to administrators for administrative
/// regions).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrustTier {
    /// Use buttons, levers, doors, beds.
    Access,
    /// Open containers, interact with animals.
    Inventory,
    /// Place and break blocks.
    Build,
    /// Grant tiers up to `Build` to others.
    Manage,
    /// Resize, delete, subdivide.
    Edit,
}

impl TrustTier {
    /// Tiers stored in a [`PermissionTable`].
    pub const TABLE: [Self; 3] = [Self::Access, Self::Inventory, Self::Build];

    /// Whether holding `self` satisfies a request for `other`.
    #[must_use]
    pub fn implies(self, other: Self) -> bool {
        self >= other
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Inventory => "inventory",
            Self::Build => "build",
            Self::Manage => "manage",
            Self::Edit => "edit",
        }
    }

    /// Parse a lowercase tier name as shown by [`TrustTier::name`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "access" => Some(Self::Access),
            "inventory" | "container" => Some(Self::Inventory),
            "build" => Some(Self::Build),
            "manage" => Some(Self::Manage),
            "edit" => Some(Self::Edit),
            _ => None,
        }
    }
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Who a grant applies to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grantee {
    /// A single actor.
    Player(ActorId),
    /// Everyone.
    Public,
    /// Any actor holding this host permission node.
    ExternalNode(String),
}

impl Grantee {
    /// Parse the textual form: `public`, `[node.name]`, or a UUID.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("public") || token == "all" {
            return Some(Self::Public);
        }
        if let Some(node) = token.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            return (!node.is_empty()).then(|| Self::ExternalNode(node.to_owned()));
        }
        uuid::Uuid::parse_str(token)
            .ok()
            .map(|uuid| Self::Player(ActorId::from_uuid(uuid)))
    }
}

impl fmt::Display for Grantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(actor) => write!(f, "{actor}"),
            Self::Public => f.write_str("public"),
            Self::ExternalNode(node) => write!(f, "[{node}]"),
        }
    }
}

/// Grantee → tier map holding at most one tier (`Access`..=`Build`) per grantee.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTable {
    grants: BTreeMap<Grantee, TrustTier>,
}

impl PermissionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `tier`, replacing any earlier grant to the same grantee.
    ///
    /// Returns the replaced tier.
    pub fn set(&mut self, grantee: Grantee, tier: TrustTier) -> Option<TrustTier> {
        debug_assert!(tier <= TrustTier::Build, "{tier} is not a table tier");
        self.grants.insert(grantee, tier)
    }

    pub fn remove(&mut self, grantee: &Grantee) -> Option<TrustTier> {
        self.grants.remove(grantee)
    }

    #[must_use]
    pub fn tier_of(&self, grantee: &Grantee) -> Option<TrustTier> {
        self.grants.get(grantee).copied()
    }

    /// Grantees holding exactly `tier`.
    pub fn grantees(&self, tier: TrustTier) -> impl Iterator<Item = &Grantee> {
        self.grants
            .iter()
            .filter(move |(_, granted)| **granted == tier)
            .map(|(grantee, _)| grantee)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Grantee, TrustTier)> {
        self.grants.iter().map(|(grantee, tier)| (grantee, *tier))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn clear(&mut self) {
        self.grants.clear();
    }
}

/// A claimed box of blocks.
///
/// Fields are only mutated by the engine while it holds its write guard;
/// callers receive clones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub(crate) id: RegionId,
    pub(crate) world: WorldId,
    pub(crate) bounds: Bounds,
    /// `None` marks an administrative region.
    pub(crate) owner: Option<ActorId>,
    pub(crate) parent: Option<RegionId>,
    /// Sorted by id.
    pub(crate) children: Vec<RegionId>,
    pub(crate) permissions: PermissionTable,
    pub(crate) managers: BTreeSet<Grantee>,
    pub(crate) allow_explosions: bool,
    /// Subdivision only: ignore the parent's grants.
    pub(crate) restrict_subclaim_to_explicit: bool,
    /// Unix seconds.
    pub(crate) created_at: u64,
    #[serde(skip)]
    pub(crate) registered: bool,
}

impl Region {
    pub(crate) fn new(
        id: RegionId,
        world: WorldId,
        bounds: Bounds,
        owner: Option<ActorId>,
        parent: Option<RegionId>,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            world,
            bounds,
            owner,
            parent,
            children: Vec::new(),
            permissions: PermissionTable::new(),
            managers: BTreeSet::new(),
            allow_explosions: false,
            restrict_subclaim_to_explicit: false,
            created_at,
            registered: false,
        }
    }

    #[must_use]
    pub const fn id(&self) -> RegionId {
        self.id
    }

    #[must_use]
    pub const fn world(&self) -> &WorldId {
        &self.world
    }

    #[must_use]
    pub const fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Stored owner. Subdivisions inherit their effective owner from the root,
    /// see [`crate::RegionIndex::effective_owner`].
    #[must_use]
    pub const fn owner(&self) -> Option<ActorId> {
        self.owner
    }

    #[must_use]
    pub const fn parent(&self) -> Option<RegionId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[RegionId] {
        &self.children
    }

    #[must_use]
    pub const fn permissions(&self) -> &PermissionTable {
        &self.permissions
    }

    pub fn managers(&self) -> impl Iterator<Item = &Grantee> {
        self.managers.iter()
    }

    #[must_use]
    pub const fn allow_explosions(&self) -> bool {
        self.allow_explosions
    }

    #[must_use]
    pub const fn restrict_subclaim_to_explicit(&self) -> bool {
        self.restrict_subclaim_to_explicit
    }

    #[must_use]
    pub const fn created_at(&self) -> u64 {
        self.created_at
    }

    /// False once the region has been deleted from the index.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    #[must_use]
    pub const fn is_subdivision(&self) -> bool {
        self.parent.is_some()
    }

    #[must_use]
    pub const fn area(&self) -> i64 {
        self.bounds.area()
    }

    #[must_use]
    pub const fn contains(&self, pos: BlockPos, ignore_height: bool) -> bool {
        self.bounds.contains(pos, ignore_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_order() {
        assert!(TrustTier::Build.implies(TrustTier::Access));
        assert!(TrustTier::Manage.implies(TrustTier::Build));
        assert!(!TrustTier::Inventory.implies(TrustTier::Build));
        assert!(TrustTier::Edit > TrustTier::Manage);
    }

    #[test]
    fn test_table_one_tier_per_grantee() {
        let alice = Grantee::Player(ActorId::from_u128(1));
        let mut table = PermissionTable::new();

        assert_eq!(table.set(alice.clone(), TrustTier::Build), None);
        assert_eq!(table.set(alice.clone(), TrustTier::Access), Some(TrustTier::Build));
        assert_eq!(table.tier_of(&alice), Some(TrustTier::Access));
        assert_eq!(table.grantees(TrustTier::Build).count(), 0);
        assert_eq!(table.grantees(TrustTier::Access).count(), 1);
    }

    #[test]
    fn test_grantee_parse() {
        assert_eq!(Grantee::parse("public"), Some(Grantee::Public));
        assert_eq!(
            Grantee::parse("[group.builders]"),
            Some(Grantee::ExternalNode("group.builders".to_owned()))
        );
        assert_eq!(Grantee::parse("[]"), None);

        let actor = ActorId::from_u128(42);
        assert_eq!(
            Grantee::parse(&actor.to_string()),
            Some(Grantee::Player(actor))
        );
        assert_eq!(Grantee::parse("bob"), None);
    }

    #[test]
    fn test_tier_names_roundtrip() {
        for tier in [
            TrustTier::Access,
            TrustTier::Inventory,
            TrustTier::Build,
            TrustTier::Manage,
            TrustTier::Edit,
        ] {
            assert_eq!(TrustTier::from_name(tier.name()), Some(tier));
        }
    }
}
