//! Invariant checks over a deterministic field of generated claims.

use std::sync::Arc;

use claim_engine::prelude::*;
use claim_engine::{CapabilityTable, Region};

const ACTORS: [ActorId; 4] = [
    ActorId::from_u128(1),
    ActorId::from_u128(2),
    ActorId::from_u128(3),
    ActorId::from_u128(4),
];

const TIERS: [TrustTier; 5] = [
    TrustTier::Access,
    TrustTier::Inventory,
    TrustTier::Build,
    TrustTier::Manage,
    TrustTier::Edit,
];

/// Small linear congruential generator so runs are reproducible.
struct Lcg(u64);

impl Lcg {
    fn below(&mut self, bound: i32) -> i32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((self.0 >> 33) % bound as u64) as i32
    }
}

struct Field {
    engine: ClaimEngine,
    world: WorldId,
}

/// Attempt a few hundred random claims, subdivisions, resizes, grants and
/// deletions. Failures are expected and ignored; the invariants must hold
/// regardless.
fn populate(seed: u64) -> Field {
    let caps = Arc::new(CapabilityTable::new());
    caps.grant_node(ACTORS[3], "group.friends");
    let config = ClaimConfig {
        initial_blocks: 3000,
        ..ClaimConfig::default()
    };
    let engine = ClaimEngine::new(config, caps);
    let world = WorldId::new("world");
    let mut rng = Lcg(seed);

    for step in 0..400u64 {
        let actor = ACTORS[rng.below(4) as usize];
        let x = rng.below(400) - 200;
        let z = rng.below(400) - 200;
        let w = rng.below(30) + 3;
        let l = rng.below(30) + 3;
        let a = BlockPos::new(x, 40 + rng.below(20), z);
        let b = BlockPos::new(x + w, 60 + rng.below(20), z + l);

        match rng.below(6) {
            0 | 1 => {
                let _ = engine.create_region(
                    actor,
                    NewRegion {
                        world: world.clone(),
                        bounds: Bounds::from_corners(a, b),
                        kind: RegionKind::Claim,
                    },
                    step,
                );
            }
            2 => {
                let owned = engine.regions_owned_by(actor);
                if let Some(parent) = owned.first().and_then(|id| engine.region(*id)) {
                    let min = parent.bounds().min();
                    let sub = Bounds::from_corners(
                        min.offset(rng.below(4), 0, rng.below(4)),
                        min.offset(rng.below(6) + 2, 10, rng.below(6) + 2),
                    );
                    let _ = engine.create_region(
                        actor,
                        NewRegion {
                            world: world.clone(),
                            bounds: sub,
                            kind: RegionKind::Subdivision { parent: parent.id() },
                        },
                        step,
                    );
                }
            }
            3 => {
                if let Some(id) = engine.regions_owned_by(actor).last() {
                    let _ = engine.resize_region(actor, *id, Bounds::from_corners(a, b));
                }
            }
            4 => {
                let target = ACTORS[rng.below(4) as usize];
                let tier = TIERS[rng.below(4) as usize];
                let grantee = match rng.below(3) {
                    0 => Grantee::Public,
                    1 => Grantee::ExternalNode("group.friends".to_owned()),
                    _ => Grantee::Player(target),
                };
                let _ = engine.set_permission_on_all_owned(actor, tier, &grantee);
            }
            _ => {
                if let Some(id) = engine.regions_owned_by(actor).first() {
                    let _ = engine.delete_region(actor, *id);
                }
            }
        }
    }

    Field { engine, world }
}

fn top_level(regions: &[Region]) -> Vec<&Region> {
    regions.iter().filter(|r| r.parent().is_none()).collect()
}

#[test]
fn test_no_top_level_overlap() {
    for seed in [1, 7, 42] {
        let field = populate(seed);
        let regions = field.engine.snapshot();
        let tops = top_level(&regions);
        assert!(tops.len() > 2, "seed {seed} produced too few claims");

        for (i, a) in tops.iter().enumerate() {
            for b in &tops[i + 1..] {
                assert!(
                    !a.bounds().footprint_overlaps(b.bounds()),
                    "seed {seed}: {:?} overlaps {:?}",
                    a.id(),
                    b.id()
                );
            }
        }
    }
}

#[test]
fn test_subdivisions_stay_inside_parents() {
    let field = populate(3);
    let regions = field.engine.snapshot();

    for region in &regions {
        if let Some(parent) = region.parent() {
            let parent = field.engine.region(parent).unwrap();
            assert!(parent.bounds().footprint_encloses(region.bounds()));
            assert!(parent.children().contains(&region.id()));
        }
    }
}

#[test]
fn test_ledger_conservation() {
    for seed in [2, 11] {
        let field = populate(seed);
        let regions = field.engine.snapshot();

        for actor in ACTORS {
            let expected: i64 = top_level(&regions)
                .into_iter()
                .filter(|r| r.owner() == Some(actor))
                .map(Region::area)
                .sum();
            assert_eq!(field.engine.ledger_entry(actor).spent, expected, "seed {seed}");
        }
    }
}

#[test]
fn test_containment_is_deterministic() {
    let field = populate(5);
    let regions = field.engine.snapshot();
    let mut rng = Lcg(99);

    for _ in 0..500 {
        let pos = BlockPos::new(rng.below(440) - 220, rng.below(100), rng.below(440) - 220);
        let plain = field.engine.find_containing(&field.world, pos, false, None);

        // Any hint, right or wrong, must yield the same answer.
        for hint in regions.iter().map(Region::id).take(10) {
            assert_eq!(
                field.engine.find_containing(&field.world, pos, false, Some(hint)),
                plain
            );
        }

        if let Some(id) = plain {
            let found = field.engine.region(id).unwrap();
            assert!(found.contains(pos, false));
            // Nothing deeper contains the point.
            for child in found.children() {
                assert!(!field.engine.region(*child).unwrap().contains(pos, false));
            }
        }
    }
}

fn effective_owner(engine: &ClaimEngine, region: &Region) -> Option<ActorId> {
    let mut root = region.clone();
    while let Some(parent) = root.parent() {
        root = engine.region(parent).unwrap();
    }
    root.owner()
}

#[test]
fn test_permission_monotonicity_and_owner_omnipotence() {
    let field = populate(8);
    let regions = field.engine.snapshot();

    for region in &regions {
        let owner = effective_owner(&field.engine, region);

        for actor in ACTORS {
            let allowed: Vec<bool> = TIERS
                .iter()
                .map(|tier| field.engine.resolve(actor, Some(region.id()), *tier).is_ok())
                .collect();

            if Some(actor) == owner {
                assert!(allowed.iter().all(|ok| *ok), "owner denied on {:?}", region.id());
            }
            // Holding a tier implies every weaker tier.
            for pair in allowed.windows(2) {
                assert!(pair[0] || !pair[1], "monotonicity broken on {:?}", region.id());
            }
        }
    }
}
