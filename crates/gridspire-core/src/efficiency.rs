//! Efficiency and bottleneck computation.
//!
//! A card's throughput multiplier is the minimum per-input satisfaction
//! ratio: a multi-input card runs exactly as fast as its scarcest input.
//! Ratios compare true values (settled + carry) so sub-unit progress counts.

use crate::config::GameConfig;
use crate::event::Event;
use crate::fixed::Fixed64;
use crate::id::{CardId, ResourceId};
use crate::state::GameState;
use serde::{Deserialize, Serialize};

/// Throughput multiplier for an automated card, recomputed on demand.
/// Never assumed stale-safe beyond one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EfficiencyRecord {
    /// Multiplier in `[0,1]`.
    pub value: Fixed64,
    /// The input capping the value, or `None` for zero-input producers.
    pub bottleneck: Option<ResourceId>,
    /// True when the card requires no inputs.
    pub is_base_producer: bool,
}

/// Production throughput for an automated card. Created when automation
/// starts; `actual_rate` is refreshed by every efficiency recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRate {
    pub base_rate: Fixed64,
    pub efficiency: Fixed64,
    pub actual_rate: Fixed64,
}

/// Compute a card's efficiency from current input availability.
///
/// Zero-input cards are base producers: efficiency 1.0, no bottleneck, and
/// no further computation. Otherwise each required input contributes
/// `min(true_value / required, 1)` -- abundance never exceeds full
/// satisfaction -- and the overall efficiency is the minimum ratio, with the
/// first input achieving it recorded as the bottleneck. A requirement of
/// zero is non-binding (ratio 1.0, no division).
///
/// Side effects: updates the stored efficiency record, refreshes the
/// production-rate record's actual rate if one exists, and publishes
/// `EfficiencyChanged`. An invalid card id logs and returns 0 without
/// mutating anything.
pub fn compute_efficiency(state: &mut GameState, config: &GameConfig, card: CardId) -> Fixed64 {
    let idx = card.0 as usize;
    if idx >= state.cards.len() {
        tracing::warn!(?card, "invalid card id");
        return Fixed64::ZERO;
    }
    let Some(def) = config.card(card) else {
        tracing::warn!(?card, "card missing from configuration");
        return Fixed64::ZERO;
    };

    if def.input_requirements.is_empty() {
        state.efficiencies[idx] = Some(EfficiencyRecord {
            value: Fixed64::ONE,
            bottleneck: None,
            is_base_producer: true,
        });
        return Fixed64::ONE;
    }

    // Ratios are clamped to 1, so any real ratio beats the sentinel and the
    // first minimum wins ties. Even a fully-satisfied card records its first
    // input as the bottleneck; only zero-input producers have none.
    let mut value = Fixed64::from_num(2);
    let mut bottleneck = None;
    for (resource, required) in &def.input_requirements {
        let ratio = if *required <= Fixed64::ZERO {
            Fixed64::ONE
        } else {
            let available = state.true_value(*resource);
            (available / *required).min(Fixed64::ONE)
        };
        if ratio < value {
            value = ratio;
            bottleneck = Some(*resource);
        }
    }

    state.efficiencies[idx] = Some(EfficiencyRecord {
        value,
        bottleneck,
        is_base_producer: false,
    });
    if let Some(rate) = state.rates[idx].as_mut() {
        rate.efficiency = value;
        rate.actual_rate = rate.base_rate.saturating_mul(value);
    }
    state.publish(Event::EfficiencyChanged {
        card,
        efficiency: value,
        bottleneck,
    });
    value
}

// ===========================================================================
// Tests
// ===========================================================================
