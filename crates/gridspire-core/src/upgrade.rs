//! Tier-upgrade transactions.
//!
//! Upgrades are strictly sequential per card (tier N -> N+1 only, no
//! skipping, no bulk path) and all-or-nothing: either every cost-map entry
//! is deducted and the tier increments, or nothing changes.

use crate::config::GameConfig;
use crate::event::Event;
use crate::id::{CardId, ResourceId};
use crate::state::GameState;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UpgradeError {
    #[error("unknown card: {0:?}")]
    UnknownCard(CardId),
    #[error("no upgrade available for {card:?} at tier {tier}")]
    NoUpgradeAvailable { card: CardId, tier: u32 },
    #[error("insufficient {resource:?}: have {have}, need {need}")]
    Insufficient {
        resource: ResourceId,
        have: u64,
        need: u64,
    },
    #[error("cost deduction failed mid-upgrade for {card:?} on {resource:?}")]
    Inconsistent {
        card: CardId,
        resource: ResourceId,
    },
}

/// Result of a successful upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeReceipt {
    pub new_tier: u32,
    pub automated: bool,
}

/// True iff a cost table entry exists for the card's next tier and the
/// ledger's settled amounts satisfy every entry in it.
pub fn can_upgrade(state: &GameState, config: &GameConfig, card: CardId) -> bool {
    let Some(card_state) = state.card(card) else {
        return false;
    };
    let Some(def) = config.card(card) else {
        return false;
    };
    let next = card_state.tier + 1;
    match def.upgrade_costs.get(&next) {
        Some(costs) => state.has_at_least(costs),
        None => false,
    }
}

/// Upgrade a card to its next tier.
///
/// Re-validates affordability first (guards against a race between a UI
/// check and the actual click), deducts every cost entry, increments the
/// tier by exactly one, applies the tier benefit (an automation grant turns
/// automation on when the card is placed and initializes a fresh
/// production-rate record), and publishes `CardUpgraded`.
pub fn upgrade(
    state: &mut GameState,
    config: &GameConfig,
    card: CardId,
) -> Result<UpgradeReceipt, UpgradeError> {
    let Some(card_state) = state.card(card) else {
        tracing::warn!(?card, "invalid card id");
        return Err(UpgradeError::UnknownCard(card));
    };
    let def = config.card(card).ok_or(UpgradeError::UnknownCard(card))?;

    let next = card_state.tier + 1;
    let Some(costs) = def.upgrade_costs.get(&next) else {
        tracing::warn!(?card, tier = card_state.tier, "no upgrade available");
        return Err(UpgradeError::NoUpgradeAvailable {
            card,
            tier: card_state.tier,
        });
    };

    for (resource, need) in costs {
        let have = state.resource(*resource);
        if have < *need {
            return Err(UpgradeError::Insufficient {
                resource: *resource,
                have,
                need: *need,
            });
        }
    }

    // Deduct everything. The guard above makes failure impossible, but a
    // mid-loop failure must still surface as a consistency error rather
    // than a silently half-paid upgrade.
    for (resource, amount) in costs {
        if state.subtract_whole(*resource, *amount).is_err() {
            tracing::error!(?card, ?resource, "cost deduction failed after guard");
            return Err(UpgradeError::Inconsistent {
                card,
                resource: *resource,
            });
        }
    }

    state.cards[card.0 as usize].tier = next;

    let benefit = def.tier_benefits.get(&next);
    if let Some(benefit) = benefit
        && benefit.automation
        && state.cards[card.0 as usize].placed.is_some()
    {
        // start_automation cannot fail here: the card exists, is placed,
        // and is now tier 1+.
        let _ = state.start_automation(config, card);
    }

    let automated = state.cards[card.0 as usize].automated;
    state.publish(Event::CardUpgraded {
        card,
        new_tier: next,
        automated,
    });

    Ok(UpgradeReceipt {
        new_tier: next,
        automated,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
