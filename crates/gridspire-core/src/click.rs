//! Rate-limited manual actions on placed cards.
//!
//! A manual action consumes and produces the card's configured click yield
//! atomically, subject to a fixed per-card cooldown. Rejections are typed so
//! callers can branch without string-matching log output.
//!
//! Timestamps are caller-supplied milliseconds; the gate never reads a clock.

use crate::config::GameConfig;
use crate::event::Event;
use crate::fixed::Millis;
use crate::id::{CardId, ResourceId};
use crate::state::GameState;

/// Minimum milliseconds between accepted clicks per card (10 clicks/sec).
pub const CLICK_COOLDOWN_MS: Millis = 100;

/// Why a manual action was rejected. Rate limiting is an expected
/// steady-state outcome, not a fault.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("cooldown active for {0:?}")]
    RateLimited(CardId),
    #[error("unknown card: {0:?}")]
    UnknownCard(CardId),
    #[error("card {0:?} is not placed")]
    NotPlaced(CardId),
    #[error("card {0:?} has no manual yield")]
    NoManualYield(CardId),
    #[error("insufficient {resource:?}: have {have}, need {need}")]
    Insufficient {
        resource: ResourceId,
        have: u64,
        need: u64,
    },
}

/// What an accepted manual action moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickReceipt {
    pub consumed: Vec<(ResourceId, u64)>,
    pub produced: Vec<(ResourceId, u64)>,
    pub timestamp: Millis,
}

#[derive(Debug)]
pub struct ClickGate {
    cooldown_ms: Millis,
    /// Last accepted click per card. Rejections never update this.
    last_click: Vec<Option<Millis>>,
}

impl ClickGate {
    pub fn new(config: &GameConfig) -> Self {
        Self::with_cooldown(config, CLICK_COOLDOWN_MS)
    }

    pub fn with_cooldown(config: &GameConfig, cooldown_ms: Millis) -> Self {
        Self {
            cooldown_ms,
            last_click: vec![None; config.card_count()],
        }
    }

    /// Handle a manual click on a card at `now_ms`.
    ///
    /// Checks, in order: cooldown, card existence, placement, configured
    /// yield, resource availability. Consumption and production happen
    /// atomically -- an insufficient resource rejects with no partial
    /// effect. On success the production counter grows by the produced
    /// quantity and `CardClicked` fires with the exact moved maps.
    pub fn handle_click(
        &mut self,
        state: &mut GameState,
        config: &GameConfig,
        card: CardId,
        now_ms: Millis,
    ) -> Result<ClickReceipt, ActionError> {
        if let Some(last) = self.last_click.get(card.0 as usize).copied().flatten()
            && now_ms.saturating_sub(last) < self.cooldown_ms
        {
            state.publish(Event::ClickRateLimited {
                card,
                timestamp: now_ms,
            });
            return Err(ActionError::RateLimited(card));
        }

        let Some(card_state) = state.card(card) else {
            return Err(ActionError::UnknownCard(card));
        };
        if card_state.placed.is_none() {
            return Err(ActionError::NotPlaced(card));
        }

        let def = config.card(card).ok_or(ActionError::UnknownCard(card))?;
        let Some(yield_) = def.manual_yield.as_ref() else {
            return Err(ActionError::NoManualYield(card));
        };

        // Every consumed resource must be covered by its settled amount
        // before anything moves.
        for (resource, need) in &yield_.consume {
            let have = state.resource(*resource);
            if have < *need {
                return Err(ActionError::Insufficient {
                    resource: *resource,
                    have,
                    need: *need,
                });
            }
        }

        let consumed = yield_.consume.clone();
        let produced = yield_.produce.clone();
        for (resource, amount) in &consumed {
            // Pre-checked above; the ledger enforces it again regardless.
            let _ = state.subtract_whole(*resource, *amount);
        }
        let mut produced_total = 0u64;
        for (resource, amount) in &produced {
            let _ = state.add_whole(*resource, *amount);
            produced_total += amount;
        }
        if produced_total > 0 {
            let _ = state.increment_production(card, produced_total);
        }

        self.last_click[card.0 as usize] = Some(now_ms);
        state.publish(Event::CardClicked {
            card,
            consumed: consumed.clone(),
            produced: produced.clone(),
            timestamp: now_ms,
        });

        Ok(ClickReceipt {
            consumed,
            produced,
            timestamp: now_ms,
        })
    }

    /// Milliseconds until the next accepted click, 0 if ready. A pure query:
    /// it never records an attempt.
    pub fn remaining_cooldown(&self, card: CardId, now_ms: Millis) -> Millis {
        match self.last_click.get(card.0 as usize).copied().flatten() {
            Some(last) => self
                .cooldown_ms
                .saturating_sub(now_ms.saturating_sub(last)),
            None => 0,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
