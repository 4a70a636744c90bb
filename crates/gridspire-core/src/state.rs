//! The authoritative game state: resource ledger, card table, and event bus.
//!
//! # Architecture
//!
//! `GameState` owns:
//! - Settled resource amounts (`u64`) and their sub-unit carries ([`Fixed64`],
//!   always in `[0,1)`)
//! - The discovered-resource set
//! - Per-card state: placement, tier, automation flag, cumulative production,
//!   unlock flag, output carry
//! - Production-rate and efficiency records for automated cards
//! - The [`EventBus`]
//!
//! Every mutation is a single synchronous read-check-write-publish step.
//! Reactions collected by the bus during publish (unlock rules) are applied
//! to a fixpoint before the mutating call returns, so callers observe unlock
//! cascades synchronously.
//!
//! Configuration is injected per call -- the state holds no reference to it,
//! which keeps save/restore free of lifetime entanglement.

use crate::config::GameConfig;
use crate::efficiency::{EfficiencyRecord, ProductionRate};
use crate::event::{Event, EventBus, Reaction};
use crate::fixed::{Fixed64, Millis, whole_to_fixed64};
use crate::id::{CardId, GridPos, ResourceId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("unknown resource: {0:?}")]
    UnknownResource(ResourceId),
    #[error("unknown card: {0:?}")]
    UnknownCard(CardId),
    #[error("insufficient {resource:?}: have {have}, need {need}")]
    Insufficient {
        resource: ResourceId,
        have: u64,
        need: u64,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("unknown card: {0:?}")]
    UnknownCard(CardId),
    #[error("position [{row}, {col}] is outside the grid")]
    OutOfBounds { row: u32, col: u32 },
    #[error("position [{row}, {col}] is already occupied")]
    Occupied { row: u32, col: u32 },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AutomationError {
    #[error("unknown card: {0:?}")]
    UnknownCard(CardId),
    #[error("card {0:?} is tier 0 (manual only)")]
    TierTooLow(CardId),
    #[error("card {0:?} must be placed on the grid first")]
    NotPlaced(CardId),
}

// ---------------------------------------------------------------------------
// Card state
// ---------------------------------------------------------------------------

/// Mutable per-card state. Created once per configured card at startup and
/// never destroyed; a reset replaces the whole table.
#[derive(Debug, Clone, PartialEq)]
pub struct CardState {
    pub id: CardId,
    pub placed: Option<GridPos>,
    /// Upgrade level. Starts at 0, monotonically non-decreasing.
    pub tier: u32,
    pub automated: bool,
    /// Cumulative whole units ever produced, manual and automated.
    pub production: u64,
    pub unlocked: bool,
    /// Fractional output not yet flushed into the ledger. In `[0,1)`.
    pub carry: Fixed64,
}

/// Free-form session metadata carried through saves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub playtime_ms: Millis,
    pub last_save: Option<Millis>,
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct GameState {
    /// Settled whole-unit amounts, indexed by ResourceId.
    pub(crate) resources: Vec<u64>,
    /// Sub-unit carries, indexed by ResourceId. Always in `[0,1)`.
    pub(crate) carries: Vec<Fixed64>,
    /// Whether each resource has ever been settled above zero.
    pub(crate) discovered: Vec<bool>,
    /// Per-card state, indexed by CardId.
    pub(crate) cards: Vec<CardState>,
    /// Production-rate records for cards with automation started.
    pub(crate) rates: Vec<Option<ProductionRate>>,
    /// Efficiency records, recomputed on demand.
    pub(crate) efficiencies: Vec<Option<EfficiencyRecord>>,
    pub(crate) grid_rows: u32,
    pub(crate) grid_cols: u32,
    pub meta: Meta,
    pub bus: EventBus,
}

impl GameState {
    /// Create a fresh state for the given configuration. Only the starter
    /// card begins unlocked.
    pub fn new(config: &GameConfig) -> Self {
        let resource_count = config.resource_count();
        let cards = config
            .card_ids()
            .map(|id| CardState {
                id,
                placed: None,
                tier: 0,
                automated: false,
                production: 0,
                unlocked: id == config.starter_card(),
                carry: Fixed64::ZERO,
            })
            .collect::<Vec<_>>();
        let card_count = cards.len();

        Self {
            resources: vec![0; resource_count],
            carries: vec![Fixed64::ZERO; resource_count],
            discovered: vec![false; resource_count],
            cards,
            rates: vec![None; card_count],
            efficiencies: vec![None; card_count],
            grid_rows: config.grid_rows(),
            grid_cols: config.grid_cols(),
            meta: Meta::default(),
            bus: EventBus::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Event publication
    // -----------------------------------------------------------------------

    /// Publish an event and apply any reactions to a fixpoint. Reactions may
    /// publish further events (e.g. `CardUnlocked`), which may produce more
    /// reactions; the loop runs until the pending list drains empty.
    pub(crate) fn publish(&mut self, event: Event) {
        self.bus.publish(&event);
        loop {
            let reactions = self.bus.drain_reactions();
            if reactions.is_empty() {
                break;
            }
            for reaction in reactions {
                match reaction {
                    Reaction::UnlockCard {
                        card,
                        kind,
                        trigger,
                    } => {
                        let Some(entry) = self.cards.get_mut(card.0 as usize) else {
                            tracing::warn!(?card, "unlock reaction targets unknown card");
                            continue;
                        };
                        // Idempotent: already-unlocked targets are not
                        // re-notified.
                        if entry.unlocked {
                            continue;
                        }
                        entry.unlocked = true;
                        self.bus.publish(&Event::CardUnlocked {
                            card,
                            kind,
                            trigger,
                        });
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Resource mutations
    // -----------------------------------------------------------------------

    fn resource_index(&self, resource: ResourceId) -> Result<usize, LedgerError> {
        let idx = resource.0 as usize;
        if idx >= self.resources.len() {
            tracing::warn!(?resource, "invalid resource id");
            return Err(LedgerError::UnknownResource(resource));
        }
        Ok(idx)
    }

    /// Mark a resource discovered. One-time, idempotent.
    fn note_discovery(&mut self, resource: ResourceId) {
        let idx = resource.0 as usize;
        if !self.discovered[idx] {
            self.discovered[idx] = true;
            self.publish(Event::ResourceDiscovered { resource });
        }
    }

    /// Add whole units to a resource's settled amount.
    ///
    /// Fires `ResourceChanged`; a transition from exactly zero to positive
    /// marks the resource discovered and fires `ResourceDiscovered` once.
    pub fn add_whole(&mut self, resource: ResourceId, amount: u64) -> Result<(), LedgerError> {
        let idx = self.resource_index(resource)?;
        let was_zero = self.resources[idx] == 0;
        self.resources[idx] = self.resources[idx].saturating_add(amount);
        let new_total = self.resources[idx];
        self.publish(Event::ResourceChanged {
            resource,
            delta: i64::try_from(amount).unwrap_or(i64::MAX),
            new_total,
            carry: self.carries[idx],
        });
        if was_zero && new_total > 0 {
            self.note_discovery(resource);
        }
        Ok(())
    }

    /// Subtract whole units. Fails with no mutation if the settled amount is
    /// insufficient -- resources never go negative.
    pub fn subtract_whole(&mut self, resource: ResourceId, amount: u64) -> Result<(), LedgerError> {
        let idx = self.resource_index(resource)?;
        let have = self.resources[idx];
        if have < amount {
            tracing::warn!(?resource, have, need = amount, "insufficient resource");
            return Err(LedgerError::Insufficient {
                resource,
                have,
                need: amount,
            });
        }
        self.resources[idx] = have - amount;
        self.publish(Event::ResourceChanged {
            resource,
            delta: -i64::try_from(amount).unwrap_or(i64::MAX),
            new_total: self.resources[idx],
            carry: self.carries[idx],
        });
        Ok(())
    }

    /// Accumulate a fractional amount into a resource's carry. Whole units
    /// flush into the settled amount immediately, keeping the carry in
    /// `[0,1)`. `ResourceChanged` fires only when a whole unit flushed, so
    /// tiny tick contributions do not cause an event storm.
    pub fn add_fractional(
        &mut self,
        resource: ResourceId,
        amount: Fixed64,
    ) -> Result<(), LedgerError> {
        let idx = self.resource_index(resource)?;
        self.carries[idx] = self.carries[idx].saturating_add(amount);
        let carry = self.carries[idx];
        if carry >= Fixed64::ONE || carry < Fixed64::ZERO {
            let whole = carry.floor();
            self.carries[idx] = carry - whole;
            let whole_i = whole.to_num::<i64>();
            let was_zero = self.resources[idx] == 0;
            let delta;
            if whole_i >= 0 {
                self.resources[idx] = self.resources[idx].saturating_add(whole_i as u64);
                delta = whole_i;
            } else {
                // A negative flush drains the settled amount but never takes
                // it below zero; if it would, the carry drains with it.
                let take = whole_i.unsigned_abs();
                let have = self.resources[idx];
                if take > have {
                    self.resources[idx] = 0;
                    self.carries[idx] = Fixed64::ZERO;
                    delta = -i64::try_from(have).unwrap_or(i64::MAX);
                } else {
                    self.resources[idx] = have - take;
                    delta = whole_i;
                }
            }
            let new_total = self.resources[idx];
            self.publish(Event::ResourceChanged {
                resource,
                delta,
                new_total,
                carry: self.carries[idx],
            });
            if was_zero && new_total > 0 {
                self.note_discovery(resource);
            }
        }
        Ok(())
    }

    /// Settled + carry. Used by every threshold and efficiency comparison so
    /// sub-unit progress is visible even though it is not yet spendable.
    pub fn true_value(&self, resource: ResourceId) -> Fixed64 {
        let idx = resource.0 as usize;
        if idx >= self.resources.len() {
            return Fixed64::ZERO;
        }
        whole_to_fixed64(self.resources[idx]).saturating_add(self.carries[idx])
    }

    /// Settled amount, or 0 for an unknown resource.
    pub fn resource(&self, resource: ResourceId) -> u64 {
        self.resources.get(resource.0 as usize).copied().unwrap_or(0)
    }

    /// Sub-unit carry, or 0 for an unknown resource.
    pub fn carry(&self, resource: ResourceId) -> Fixed64 {
        self.carries
            .get(resource.0 as usize)
            .copied()
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn is_discovered(&self, resource: ResourceId) -> bool {
        self.discovered
            .get(resource.0 as usize)
            .copied()
            .unwrap_or(false)
    }

    pub fn discovered_resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.discovered
            .iter()
            .enumerate()
            .filter(|(_, d)| **d)
            .map(|(i, _)| ResourceId(i as u32))
    }

    /// True iff every entry's settled amount covers the required quantity.
    /// Costs are checked against settled amounts only -- fractional carry
    /// cannot pay a cost.
    pub fn has_at_least(&self, costs: &[(ResourceId, u64)]) -> bool {
        costs
            .iter()
            .all(|(resource, amount)| self.resource(*resource) >= *amount)
    }

    // -----------------------------------------------------------------------
    // Card mutations
    // -----------------------------------------------------------------------

    pub fn card(&self, card: CardId) -> Option<&CardState> {
        self.cards.get(card.0 as usize)
    }

    pub fn cards(&self) -> impl Iterator<Item = &CardState> {
        self.cards.iter()
    }

    pub fn rate(&self, card: CardId) -> Option<&ProductionRate> {
        self.rates.get(card.0 as usize)?.as_ref()
    }

    pub fn efficiency(&self, card: CardId) -> Option<&EfficiencyRecord> {
        self.efficiencies.get(card.0 as usize)?.as_ref()
    }

    pub fn grid_rows(&self) -> u32 {
        self.grid_rows
    }

    pub fn grid_cols(&self) -> u32 {
        self.grid_cols
    }

    /// Place a card on the grid. Rejects out-of-bounds positions and cells
    /// already holding another card.
    pub fn place_card(&mut self, card: CardId, row: u32, col: u32) -> Result<(), PlacementError> {
        if card.0 as usize >= self.cards.len() {
            tracing::warn!(?card, "invalid card id");
            return Err(PlacementError::UnknownCard(card));
        }
        if row >= self.grid_rows || col >= self.grid_cols {
            tracing::warn!(row, col, "placement outside grid bounds");
            return Err(PlacementError::OutOfBounds { row, col });
        }
        let pos = GridPos { row, col };
        if self
            .cards
            .iter()
            .any(|c| c.id != card && c.placed == Some(pos))
        {
            return Err(PlacementError::Occupied { row, col });
        }
        self.cards[card.0 as usize].placed = Some(pos);
        self.publish(Event::CardPlaced { card, pos });
        Ok(())
    }

    /// Remove a card from the grid.
    pub fn remove_card(&mut self, card: CardId) -> Result<(), PlacementError> {
        if card.0 as usize >= self.cards.len() {
            tracing::warn!(?card, "invalid card id");
            return Err(PlacementError::UnknownCard(card));
        }
        self.cards[card.0 as usize].placed = None;
        self.publish(Event::CardRemoved { card });
        Ok(())
    }

    /// Increase a card's cumulative production counter.
    pub fn increment_production(&mut self, card: CardId, amount: u64) -> Result<(), LedgerError> {
        let Some(entry) = self.cards.get_mut(card.0 as usize) else {
            tracing::warn!(?card, "invalid card id");
            return Err(LedgerError::UnknownCard(card));
        };
        entry.production = entry.production.saturating_add(amount);
        let production = entry.production;
        self.publish(Event::CardProduction { card, production });
        Ok(())
    }

    /// Enable automated production. The card must be placed and tier 1+.
    /// Initializes a fresh production-rate record from the base rate scaled
    /// by the highest applicable tier benefit, then computes the initial
    /// efficiency.
    pub fn start_automation(
        &mut self,
        config: &GameConfig,
        card: CardId,
    ) -> Result<(), AutomationError> {
        let Some(entry) = self.cards.get(card.0 as usize) else {
            tracing::warn!(?card, "invalid card id");
            return Err(AutomationError::UnknownCard(card));
        };
        if entry.tier < 1 {
            tracing::warn!(?card, "card is tier 0 (manual only)");
            return Err(AutomationError::TierTooLow(card));
        }
        if entry.placed.is_none() {
            tracing::warn!(?card, "card must be placed on the grid first");
            return Err(AutomationError::NotPlaced(card));
        }
        let tier = entry.tier;
        let def = config
            .card(card)
            .ok_or(AutomationError::UnknownCard(card))?;
        let multiplier = def
            .tier_benefits
            .range(..=tier)
            .next_back()
            .map(|(_, b)| b.rate_multiplier)
            .unwrap_or(Fixed64::ONE);
        let base = def.base_rate.saturating_mul(multiplier);

        self.cards[card.0 as usize].automated = true;
        self.rates[card.0 as usize] = Some(ProductionRate {
            base_rate: base,
            efficiency: Fixed64::ONE,
            actual_rate: base,
        });
        crate::efficiency::compute_efficiency(self, config, card);
        Ok(())
    }

    /// Disable automated production. The rate record is kept for when
    /// automation resumes.
    pub fn stop_automation(&mut self, card: CardId) -> Result<(), AutomationError> {
        let Some(entry) = self.cards.get_mut(card.0 as usize) else {
            tracing::warn!(?card, "invalid card id");
            return Err(AutomationError::UnknownCard(card));
        };
        entry.automated = false;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Replace all state with fresh initial values. Bus subscribers survive.
    pub fn reset(&mut self, config: &GameConfig) {
        let fresh = GameState::new(config);
        self.resources = fresh.resources;
        self.carries = fresh.carries;
        self.discovered = fresh.discovered;
        self.cards = fresh.cards;
        self.rates = fresh.rates;
        self.efficiencies = fresh.efficiencies;
        self.grid_rows = fresh.grid_rows;
        self.grid_cols = fresh.grid_cols;
        self.meta = fresh.meta;
        self.publish(Event::StateReset);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
