//! The default hybrid unlock progression.
//!
//! A three-step sequential chain walks the player through the core
//! production loop, while four resource milestones open side cards in
//! whatever order play reaches them. The two paths are independent by
//! design: stockpiling energy unlocks the cultivator whether or not the
//! upgrade chain has moved at all.

use gridspire_core::config::GameConfig;
use gridspire_core::unlock::{MilestoneRule, SequentialRule, UnlockRuleSet};

/// Build the default unlock rules against a configuration. Panics only if
/// the configuration is missing the default cards, which
/// [`crate::default_config`] always provides.
pub fn default_unlock_rules(config: &GameConfig) -> UnlockRuleSet {
    let card = |name: &str| {
        config
            .card_id(name)
            .unwrap_or_else(|| panic!("default card missing: {name}"))
    };
    let resource = |name: &str| {
        config
            .resource_id(name)
            .unwrap_or_else(|| panic!("default resource missing: {name}"))
    };

    UnlockRuleSet::new(
        vec![
            SequentialRule {
                target: card("smelter"),
                trigger_card: card("extractor"),
                required_tier: 1,
            },
            SequentialRule {
                target: card("reactor"),
                trigger_card: card("smelter"),
                required_tier: 1,
            },
            SequentialRule {
                target: card("scanner"),
                trigger_card: card("reactor"),
                required_tier: 1,
            },
        ],
        vec![
            MilestoneRule {
                target: card("lab"),
                resource: resource("data"),
                threshold: 50,
            },
            MilestoneRule {
                target: card("cultivator"),
                resource: resource("energy"),
                threshold: 100,
            },
            MilestoneRule {
                target: card("fabricator"),
                resource: resource("metal"),
                threshold: 50,
            },
            MilestoneRule {
                target: card("depot"),
                resource: resource("ore"),
                threshold: 200,
            },
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default_config;
    use gridspire_core::state::GameState;
    use gridspire_core::upgrade;

    #[test]
    fn rule_tables_have_expected_shape() {
        let config = default_config();
        let rules = default_unlock_rules(&config);
        assert_eq!(rules.sequential().len(), 3);
        assert_eq!(rules.milestones().len(), 4);
    }

    #[test]
    fn extractor_upgrade_unlocks_smelter() {
        let config = default_config();
        let mut state = GameState::new(&config);
        default_unlock_rules(&config).attach(&mut state.bus);

        let smelter = config.card_id("smelter").unwrap();
        assert!(!state.card(smelter).unwrap().unlocked);

        let ore = config.resource_id("ore").unwrap();
        state.add_whole(ore, 50).unwrap();
        upgrade::upgrade(&mut state, &config, config.card_id("extractor").unwrap()).unwrap();

        assert!(state.card(smelter).unwrap().unlocked);
    }

    #[test]
    fn milestones_unlock_out_of_order() {
        let config = default_config();
        let mut state = GameState::new(&config);
        default_unlock_rules(&config).attach(&mut state.bus);

        let cultivator = config.card_id("cultivator").unwrap();
        let lab = config.card_id("lab").unwrap();
        let energy = config.resource_id("energy").unwrap();
        let data = config.resource_id("data").unwrap();

        // Energy milestone first, though the lab's rule was registered first.
        state.add_whole(energy, 100).unwrap();
        assert!(state.card(cultivator).unwrap().unlocked);
        assert!(!state.card(lab).unwrap().unlocked);

        state.add_whole(data, 50).unwrap();
        assert!(state.card(lab).unwrap().unlocked);
    }

    #[test]
    fn milestone_ignores_sequential_progress() {
        let config = default_config();
        let mut state = GameState::new(&config);
        default_unlock_rules(&config).attach(&mut state.bus);

        // Depot unlocks from raw ore stockpiling with zero upgrades made.
        let ore = config.resource_id("ore").unwrap();
        state.add_whole(ore, 200).unwrap();
        assert!(
            state
                .card(config.card_id("depot").unwrap())
                .unwrap()
                .unlocked
        );
        // The sequential chain has not moved.
        assert!(
            !state
                .card(config.card_id("smelter").unwrap())
                .unwrap()
                .unlocked
        );
    }
}
