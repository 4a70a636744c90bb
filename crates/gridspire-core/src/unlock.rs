//! Card unlock progression: sequential and milestone rule families.
//!
//! Rules are sealed, read-only tables attached to the event bus as reactive
//! handlers. Sequential rules fire on [`Event::CardUpgraded`] with an exact
//! tier match; milestone rules fire on [`Event::ResourceChanged`] when the
//! new total reaches the threshold. The two families are evaluated
//! independently and may unlock out of order; neither blocks the other.
//!
//! Idempotency is enforced where reactions are applied: an already-unlocked
//! target is never re-unlocked or re-notified.

use crate::event::{Event, EventBus, EventKind, Reaction, SubscriberId};
use crate::id::{CardId, ResourceId};
use crate::state::GameState;

/// Which rule family produced an unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockKind {
    Sequential,
    Milestone,
}

/// The condition that satisfied an unlock rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockTrigger {
    /// A card reached a specific tier (exact match, not ">=").
    TierReached { card: CardId, tier: u32 },
    /// A resource total reached a threshold.
    ResourceThreshold { resource: ResourceId, threshold: u64 },
}

/// An upgrade-chained unlock rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequentialRule {
    pub target: CardId,
    pub trigger_card: CardId,
    pub required_tier: u32,
}

/// A resource-threshold unlock rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MilestoneRule {
    pub target: CardId,
    pub resource: ResourceId,
    pub threshold: u64,
}

/// Progress toward a card's unlock condition, for UI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockProgress {
    pub unlocked: bool,
    pub current: u64,
    pub required: u64,
}

/// The two static rule tables.
#[derive(Debug, Clone, Default)]
pub struct UnlockRuleSet {
    sequential: Vec<SequentialRule>,
    milestones: Vec<MilestoneRule>,
}

impl UnlockRuleSet {
    pub fn new(sequential: Vec<SequentialRule>, milestones: Vec<MilestoneRule>) -> Self {
        Self {
            sequential,
            milestones,
        }
    }

    pub fn sequential(&self) -> &[SequentialRule] {
        &self.sequential
    }

    pub fn milestones(&self) -> &[MilestoneRule] {
        &self.milestones
    }

    /// Register both rule families on the bus as reactive handlers.
    /// Returns the subscriber ids (sequential, milestone).
    pub fn attach(&self, bus: &mut EventBus) -> (SubscriberId, SubscriberId) {
        let sequential = self.sequential.clone();
        let seq_id = bus.subscribe_reactive(
            EventKind::CardUpgraded,
            Box::new(move |event| {
                let Event::CardUpgraded { card, new_tier, .. } = event else {
                    return Vec::new();
                };
                sequential
                    .iter()
                    .filter(|rule| rule.trigger_card == *card && rule.required_tier == *new_tier)
                    .map(|rule| Reaction::UnlockCard {
                        card: rule.target,
                        kind: UnlockKind::Sequential,
                        trigger: UnlockTrigger::TierReached {
                            card: rule.trigger_card,
                            tier: rule.required_tier,
                        },
                    })
                    .collect()
            }),
        );

        let milestones = self.milestones.clone();
        let mile_id = bus.subscribe_reactive(
            EventKind::ResourceChanged,
            Box::new(move |event| {
                let Event::ResourceChanged {
                    resource,
                    new_total,
                    ..
                } = event
                else {
                    return Vec::new();
                };
                milestones
                    .iter()
                    .filter(|rule| rule.resource == *resource && *new_total >= rule.threshold)
                    .map(|rule| Reaction::UnlockCard {
                        card: rule.target,
                        kind: UnlockKind::Milestone,
                        trigger: UnlockTrigger::ResourceThreshold {
                            resource: rule.resource,
                            threshold: rule.threshold,
                        },
                    })
                    .collect()
            }),
        );

        (seq_id, mile_id)
    }

    /// Progress toward a card's unlock condition, or `None` if no rule
    /// targets the card.
    pub fn progress(&self, state: &GameState, card: CardId) -> Option<UnlockProgress> {
        let unlocked = state.card(card)?.unlocked;

        if let Some(rule) = self.sequential.iter().find(|r| r.target == card) {
            let current = state.card(rule.trigger_card).map(|c| c.tier).unwrap_or(0);
            return Some(UnlockProgress {
                unlocked,
                current: u64::from(current),
                required: u64::from(rule.required_tier),
            });
        }
        if let Some(rule) = self.milestones.iter().find(|r| r.target == card) {
            return Some(UnlockProgress {
                unlocked,
                current: state.resource(rule.resource),
                required: rule.threshold,
            });
        }
        None
    }
}

// ===========================================================================
// Tests
// ===========================================================================
