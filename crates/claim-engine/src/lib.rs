//! Claim engine
//!
//! Arbitrates protected world actions against player land claims.
//!
//! # Key Concepts
//!
//! - **Region**: an axis-aligned box of blocks with an owner and a trust table
//! - **Subdivision**: a region nested inside another region's footprint
//! - **Trust tier**: `Access < Inventory < Build < Manage`, plus owner-only `Edit`
//! - **Claim blocks**: the area currency bounding how much land an owner may hold
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ClaimEngine (one per server, shared behind an Arc)          │
//! │    - RwLock<EngineState { RegionIndex, ClaimBlockLedger }>   │
//! │    - Mutex<per-actor corner workflows>                       │
//! │    - Capabilities + ClaimStore collaborators                 │
//! └──────────────────────────────────────────────────────────────┘
//!          │ read guard                     │ write guard
//!          ▼                                ▼
//!   find_containing / resolve        lifecycle: create, resize,
//!   (every protected action)         delete, transfer, trust
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let engine = ClaimEngine::new(ClaimConfig::default(), Arc::new(CapabilityTable::default()));
//!
//! engine.set_corner(alice, &world, BlockPos::new(0, 64, 0))?;
//! let CornerOutcome::Committed(id) = engine.set_corner(alice, &world, BlockPos::new(9, 64, 9))? else {
//!     unreachable!()
//! };
//!
//! let mut hint = None;
//! engine.check_action(bob, &world, BlockPos::new(4, 64, 4), TrustTier::Build, &mut hint)?;
//! ```

mod actor;
mod config;
mod engine;
mod error;
mod host;
mod index;
mod ledger;
mod lifecycle;
mod overlap;
mod permission;
mod region;
mod workflow;

pub use actor::{ActorId, WorldId};
pub use claim_spatial::{BlockPos, Bounds};
pub use config::{ClaimConfig, ClaimsMode, ConfigError};
pub use engine::ClaimEngine;
pub use error::{ClaimError, ClaimResult, Denial, OwnerLabel, SizeViolation};
pub use host::{
    Capabilities, Capability, CapabilityTable, ClaimStore, NoopStore, PolicyOverride,
};
pub use index::RegionIndex;
pub use ledger::{ClaimBlockLedger, InsufficientBlocks, LedgerEntry};
pub use lifecycle::{Direction, NewRegion, RegionKind, TrustList};
pub use overlap::{check_size, validate_new_or_resized};
pub use permission::{ResolveContext, resolve, resolve_wilderness};
pub use region::{Grantee, PermissionTable, Region, RegionId, TrustTier};
pub use workflow::{CornerOutcome, PendingTarget, ShovelMode, WorkflowState};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ActorId, BlockPos, Bounds, Capability, ClaimConfig, ClaimEngine, ClaimError, CornerOutcome,
        Grantee, NewRegion, RegionId, RegionKind, ShovelMode, TrustTier, WorldId,
    };
}
