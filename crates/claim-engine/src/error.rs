//! Error types for claim operations.

use std::fmt;

use thiserror::Error;

use crate::{ActorId, RegionId, TrustTier, WorldId};

/// Owner shown in denial messages; `None` reads as the administrators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OwnerLabel(pub Option<ActorId>);

impl fmt::Display for OwnerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(owner) => write!(f, "{owner}"),
            None => f.write_str("an administrator"),
        }
    }
}

/// Why an action was refused, ready to show to the actor.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("You don't have {owner}'s permission to use that.")]
    NoAccess { owner: OwnerLabel },

    #[error("You don't have {owner}'s permission to use that container.")]
    NoContainers { owner: OwnerLabel },

    #[error("You don't have {owner}'s permission to build here.")]
    NoBuild { owner: OwnerLabel },

    #[error("You don't have {owner}'s permission to manage permissions here.")]
    NoManage { owner: OwnerLabel },

    #[error("Only {owner} can modify this claim.")]
    NotOwner { owner: OwnerLabel },

    #[error("That claim belongs to the administrators.")]
    AdminClaimsRequired,

    #[error("You can only build where you have claimed land.")]
    BuildOutsideClaims,
}

impl Denial {
    /// Standard message for lacking `tier` in a region owned by `owner`.
    #[must_use]
    pub const fn for_tier(tier: TrustTier, owner: Option<ActorId>) -> Self {
        let owner = OwnerLabel(owner);
        match tier {
            TrustTier::Access => Self::NoAccess { owner },
            TrustTier::Inventory => Self::NoContainers { owner },
            TrustTier::Build => Self::NoBuild { owner },
            TrustTier::Manage => Self::NoManage { owner },
            TrustTier::Edit => Self::NotOwner { owner },
        }
    }
}

/// Why a region footprint was rejected by the size rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SizeViolation {
    #[error("claims must be at least {min_width} blocks wide")]
    TooNarrow { min_width: i64 },

    #[error("claims must cover at least {min_area} blocks")]
    TooSmall { min_area: i64 },

    #[error("the claim radius must be at least {min_radius}")]
    RadiusTooSmall { min_radius: i32 },
}

/// Errors that can occur during claim operations
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("permission denied ({tier}): {reason}")]
    PermissionDenied { tier: TrustTier, reason: Denial },

    #[error("not enough claim blocks: {0} more needed")]
    InsufficientClaimBlocks(i64),

    #[error("region too small: {0}")]
    RegionTooSmall(SizeViolation),

    #[error("overlaps region {0}")]
    RegionOverlap(RegionId),

    #[error("subdivision must lie within its parent's footprint")]
    SubdivisionOutOfParentBounds,

    #[error("subdivision {0} would fall outside the resized region")]
    SubdivisionOutsideResize(RegionId),

    #[error("invalid transfer target")]
    InvalidTransferTarget,

    #[error("region not found: {0}")]
    RegionNotFound(RegionId),

    #[error("region {0} was removed while the claim workflow was pending")]
    StaleWorkflowState(RegionId),

    #[error("land claims are disabled in world {0}")]
    ClaimsDisabled(WorldId),

    #[error("claim limit of {0} reached")]
    ClaimCountLimit(usize),

    #[error("region {0} is not a subdivision")]
    NotASubdivision(RegionId),

    #[error("{0} cannot be granted through a permission table")]
    UngrantableTier(TrustTier),

    #[error("region {0} has corrupt bounds")]
    CorruptBounds(RegionId),

    #[error("no claim workflow is pending")]
    NoPendingWorkflow,

    /// A requested coordinate falls outside the representable block range.
    #[error("coordinates out of range")]
    CoordinateOutOfRange,
}

impl ClaimError {
    #[must_use]
    pub const fn denied(tier: TrustTier, reason: Denial) -> Self {
        Self::PermissionDenied { tier, reason }
    }
}

impl From<SizeViolation> for ClaimError {
    fn from(violation: SizeViolation) -> Self {
        Self::RegionTooSmall(violation)
    }
}

/// Result type for claim operations
pub type ClaimResult<T> = Result<T, ClaimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_messages_name_owner() {
        let owner = ActorId::from_u128(7);
        let msg = Denial::for_tier(TrustTier::Build, Some(owner)).to_string();
        assert!(msg.contains(&owner.to_string()));
        assert!(msg.contains("build"));

        let admin = Denial::for_tier(TrustTier::Access, None).to_string();
        assert!(admin.contains("an administrator"));
    }

    #[test]
    fn test_error_display() {
        let err = ClaimError::InsufficientClaimBlocks(100);
        assert_eq!(err.to_string(), "not enough claim blocks: 100 more needed");

        let err: ClaimError = SizeViolation::TooSmall { min_area: 100 }.into();
        assert!(err.to_string().contains("100 blocks"));
    }
}
