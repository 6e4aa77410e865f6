//! Claim-block accounting.
//!
//! `remaining = accrued + bonus + group_bonus - spent`, where `spent` is the
//! summed footprint area of the actor's top-level claims.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ActorId, Capabilities, ClaimError};

/// Per-actor ledger row.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub accrued: i64,
    pub bonus: i64,
    pub spent: i64,
    /// Unix seconds of the last recorded activity.
    pub last_active: Option<u64>,
}

impl LedgerEntry {
    #[must_use]
    pub const fn with_initial(initial_blocks: i64) -> Self {
        Self {
            accrued: initial_blocks,
            bonus: 0,
            spent: 0,
            last_active: None,
        }
    }
}

/// A reservation would overdraw the actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("not enough claim blocks: {shortfall} more needed")]
pub struct InsufficientBlocks {
    pub shortfall: i64,
}

impl From<InsufficientBlocks> for ClaimError {
    fn from(err: InsufficientBlocks) -> Self {
        Self::InsufficientClaimBlocks(err.shortfall)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ClaimBlockLedger {
    entries: HashMap<ActorId, LedgerEntry>,
    /// Bonus granted to every holder of a permission node.
    group_bonus: BTreeMap<String, i64>,
    initial_blocks: i64,
    max_accrued: i64,
}

impl ClaimBlockLedger {
    #[must_use]
    pub fn new(initial_blocks: i64, max_accrued: i64) -> Self {
        Self {
            entries: HashMap::new(),
            group_bonus: BTreeMap::new(),
            initial_blocks,
            max_accrued,
        }
    }

    /// Current row for `actor`; unknown actors read as a fresh row.
    #[must_use]
    pub fn entry(&self, actor: ActorId) -> LedgerEntry {
        self.entries
            .get(&actor)
            .cloned()
            .unwrap_or_else(|| LedgerEntry::with_initial(self.initial_blocks))
    }

    fn entry_mut(&mut self, actor: ActorId) -> &mut LedgerEntry {
        let initial = self.initial_blocks;
        self.entries
            .entry(actor)
            .or_insert_with(|| LedgerEntry::with_initial(initial))
    }

    /// Summed bonus of every group node `actor` holds.
    #[must_use]
    pub fn group_bonus_for(&self, actor: ActorId, capabilities: &dyn Capabilities) -> i64 {
        self.group_bonus
            .iter()
            .filter(|(node, _)| capabilities.has_permission_node(actor, node))
            .map(|(_, bonus)| *bonus)
            .sum()
    }

    #[must_use]
    pub fn remaining(&self, actor: ActorId, capabilities: &dyn Capabilities) -> i64 {
        let entry = self.entry(actor);
        entry.accrued + entry.bonus + self.group_bonus_for(actor, capabilities) - entry.spent
    }

    /// Charge `area` to `actor`. With `allow_overdraft` the charge always succeeds.
    pub fn reserve(
        &mut self,
        actor: ActorId,
        area: i64,
        capabilities: &dyn Capabilities,
        allow_overdraft: bool,
    ) -> Result<(), InsufficientBlocks> {
        let remaining = self.remaining(actor, capabilities);
        if area > remaining && !allow_overdraft {
            return Err(InsufficientBlocks {
                shortfall: area.saturating_sub(remaining),
            });
        }
        let entry = self.entry_mut(actor);
        entry.spent = entry.spent.saturating_add(area);
        Ok(())
    }

    /// Return `area` to `actor`, keeping `ratio` of it.
    ///
    /// Returns the penalty taken from `accrued`.
    pub fn release(&mut self, actor: ActorId, area: i64, ratio: f64) -> i64 {
        let penalty = abandon_penalty(area, ratio);
        let entry = self.entry_mut(actor);
        entry.spent -= area;
        entry.accrued -= penalty;
        penalty
    }

    /// Unconditionally add `area` to `spent` (ownership transfer).
    pub fn charge(&mut self, actor: ActorId, area: i64) {
        self.entry_mut(actor).spent += area;
    }

    /// Add earned blocks, capped at `max_accrued_blocks`. An entry already
    /// above the cap is left as is.
    pub fn accrue(&mut self, actor: ActorId, delta: i64) -> i64 {
        let cap = self.max_accrued;
        let entry = self.entry_mut(actor);
        if entry.accrued < cap {
            entry.accrued = (entry.accrued + delta).min(cap);
        }
        entry.accrued
    }

    pub fn set_accrued(&mut self, actor: ActorId, amount: i64) {
        self.entry_mut(actor).accrued = amount;
    }

    pub fn adjust_bonus(&mut self, actor: ActorId, delta: i64) -> i64 {
        let entry = self.entry_mut(actor);
        entry.bonus = entry.bonus.saturating_add(delta);
        entry.bonus
    }

    /// Add `delta` bonus blocks to every known actor. Returns the actors touched, sorted.
    pub fn adjust_bonus_all(&mut self, delta: i64) -> Vec<ActorId> {
        let mut touched: Vec<ActorId> = self.entries.keys().copied().collect();
        touched.sort_unstable();
        for entry in self.entries.values_mut() {
            entry.bonus = entry.bonus.saturating_add(delta);
        }
        touched
    }

    pub fn adjust_group_bonus(&mut self, node: &str, delta: i64) -> i64 {
        let bonus = self.group_bonus.entry(node.to_owned()).or_insert(0);
        *bonus = bonus.saturating_add(delta);
        *bonus
    }

    pub fn record_activity(&mut self, actor: ActorId, now: u64) {
        self.entry_mut(actor).last_active = Some(now);
    }

    pub fn restore_entry(&mut self, actor: ActorId, entry: LedgerEntry) {
        self.entries.insert(actor, entry);
    }

    /// Overwrite every `spent` from authoritative per-owner totals.
    pub fn reset_spent(&mut self, totals: &HashMap<ActorId, i64>) {
        for entry in self.entries.values_mut() {
            entry.spent = 0;
        }
        for (actor, spent) in totals {
            self.entry_mut(*actor).spent = *spent;
        }
    }

    /// Actors with a stored row, in no particular order.
    pub fn actors(&self) -> impl Iterator<Item = (ActorId, &LedgerEntry)> {
        self.entries.iter().map(|(actor, entry)| (*actor, entry))
    }
}

/// `ceil(area × (1 − ratio))`, the blocks forfeited when abandoning a claim.
#[must_use]
pub fn abandon_penalty(area: i64, ratio: f64) -> i64 {
    let ratio = ratio.clamp(0.0, 1.0);
    (area as f64 * (1.0 - ratio)).ceil() as i64
}
