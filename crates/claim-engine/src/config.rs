//! Engine configuration.
//!
//! All fields have defaults, so a config file only needs the values it changes:
//!
//! ```json
//! {
//!   "initial_blocks": 250,
//!   "abandon_return_ratio": 0.8,
//!   "worlds": { "world_nether": "Disabled", "creative": "Creative" }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::WorldId;

/// How claims behave in a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClaimsMode {
    /// Claims protect land; unclaimed land is open.
    #[default]
    Survival,
    /// As `Survival`, but building outside claims is refused.
    SurvivalRequiringClaims,
    /// Claims protect land; administrative workflows are expected.
    Creative,
    /// No claims can be created and nothing is protected.
    Disabled,
}

/// Errors raised while loading or validating a [`ClaimConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("abandon_return_ratio must be within [0, 1], got {0}")]
    InvalidReturnRatio(f64),

    #[error("min_width must be at least 1")]
    ZeroMinWidth,

    #[error("ground_extension must not be negative, got {0}")]
    NegativeGroundExtension(i32),
}

/// Tunables for claim sizing, the block economy and expiration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimConfig {
    /// Blocks a new actor starts with.
    pub initial_blocks: i64,
    /// Cap on accrued blocks.
    pub max_accrued_blocks: i64,
    /// Share of an abandoned claim's area returned to its owner.
    pub abandon_return_ratio: f64,
    /// How far below the lower corner new claims reach.
    pub ground_extension: i32,
    /// Lowest Y a claim may reach.
    pub max_depth: Option<i32>,
    /// Highest Y of new claims; `None` keeps the designated corners' top.
    pub claim_ceiling: Option<i32>,
    pub min_width: i64,
    pub min_area: i64,
    /// Top-level claims per actor, 0 = unlimited.
    pub max_claims_per_player: usize,
    /// Days of inactivity before an actor's claims expire, 0 = never.
    pub expiration_days: u64,
    /// Actors with at least this many accrued + bonus blocks never expire, 0 = no exemption.
    pub expiration_exempt_total_blocks: i64,
    /// Actors with at least this many bonus blocks never expire, 0 = no exemption.
    pub expiration_exempt_bonus_blocks: i64,
    /// When false, explosions are allowed everywhere.
    pub block_claim_explosions: bool,
    /// Bonus blocks granted to every holder of a permission node.
    pub group_bonus: BTreeMap<String, i64>,
    pub default_mode: ClaimsMode,
    /// Per-world overrides of `default_mode`, keyed by world name.
    pub worlds: BTreeMap<String, ClaimsMode>,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            initial_blocks: 100,
            max_accrued_blocks: 2000,
            abandon_return_ratio: 1.0,
            ground_extension: 5,
            max_depth: None,
            claim_ceiling: None,
            min_width: 5,
            min_area: 100,
            max_claims_per_player: 0,
            expiration_days: 60,
            expiration_exempt_total_blocks: 10_000,
            expiration_exempt_bonus_blocks: 5_000,
            block_claim_explosions: true,
            group_bonus: BTreeMap::new(),
            default_mode: ClaimsMode::Survival,
            worlds: BTreeMap::new(),
        }
    }
}

impl ClaimConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.abandon_return_ratio) {
            return Err(ConfigError::InvalidReturnRatio(self.abandon_return_ratio));
        }
        if self.min_width < 1 {
            return Err(ConfigError::ZeroMinWidth);
        }
        if self.ground_extension < 0 {
            return Err(ConfigError::NegativeGroundExtension(self.ground_extension));
        }
        Ok(())
    }

    #[must_use]
    pub fn mode_for(&self, world: &WorldId) -> ClaimsMode {
        self.worlds
            .get(world.as_str())
            .copied()
            .unwrap_or(self.default_mode)
    }

    #[must_use]
    pub fn claims_enabled(&self, world: &WorldId) -> bool {
        self.mode_for(world) != ClaimsMode::Disabled
    }

    /// Radius used by `create_claim_around` when none is given.
    #[must_use]
    pub fn default_claim_radius(&self) -> i32 {
        let side = (self.min_area.max(1) as f64).sqrt();
        let radius = (side / 2.0).ceil() as i32;
        let min_radius = ((self.min_width - 1) as f64 / 2.0).ceil() as i32;
        radius.max(min_radius).max(1)
    }

    /// Seconds of inactivity before expiration, if enabled.
    #[must_use]
    pub const fn expiration_secs(&self) -> Option<u64> {
        match self.expiration_days {
            0 => None,
            days => Some(days.saturating_mul(86_400)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClaimConfig::default();
        assert_eq!(config.initial_blocks, 100);
        assert_eq!(config.min_area, 100);
        assert!(config.validate().is_ok());
        assert_eq!(config.default_claim_radius(), 5);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ClaimConfig::from_json_str(
            r#"{ "initial_blocks": 250, "worlds": { "nether": "Disabled" } }"#,
        )
        .unwrap();

        assert_eq!(config.initial_blocks, 250);
        assert_eq!(config.max_accrued_blocks, 2000);
        assert_eq!(config.mode_for(&WorldId::new("nether")), ClaimsMode::Disabled);
        assert_eq!(config.mode_for(&WorldId::new("world")), ClaimsMode::Survival);
        assert!(!config.claims_enabled(&WorldId::new("nether")));
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let err = ClaimConfig::from_json_str(r#"{ "abandon_return_ratio": 1.5 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidReturnRatio(r) if (r - 1.5).abs() < f64::EPSILON));

        let err = ClaimConfig::from_json_str(r#"{ "min_width": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroMinWidth));

        let err = ClaimConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_expiration_window() {
        let mut config = ClaimConfig::default();
        assert_eq!(config.expiration_secs(), Some(60 * 86_400));
        config.expiration_days = 0;
        assert_eq!(config.expiration_secs(), None);
        config.expiration_days = u64::MAX;
        assert_eq!(config.expiration_secs(), Some(u64::MAX));
    }
}
