//! The default eight-card configuration.
//!
//! Seven resources and eight cards: one free-running producer, four
//! single-input converters, two multi-input converters, and one passive
//! card. Tier 1 unlocks automation everywhere except the depot; tier 2
//! raises rates. The extractor is the starter card on a 4x5 grid.

use gridspire_core::config::{CardDef, ConfigBuilder, GameConfig, ManualYield, TierBenefit};
use gridspire_core::fixed::Fixed64;
use std::collections::BTreeMap;

fn fx(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

fn auto(rate_multiplier: f64) -> TierBenefit {
    TierBenefit {
        automation: true,
        rate_multiplier: fx(rate_multiplier),
    }
}

fn passive() -> TierBenefit {
    TierBenefit {
        automation: false,
        rate_multiplier: fx(1.0),
    }
}

/// Build the default configuration.
pub fn default_config() -> GameConfig {
    let mut b = ConfigBuilder::new();

    let ore = b.register_resource("ore");
    let metal = b.register_resource("metal");
    let energy = b.register_resource("energy");
    let data = b.register_resource("data");
    let science = b.register_resource("science");
    let bloom = b.register_resource("bloom");
    let nanites = b.register_resource("nanites");

    // Free-running ore producer; the card the whole economy bootstraps from.
    b.register_card(CardDef {
        name: "extractor".into(),
        input_requirements: vec![],
        outputs: vec![ore],
        base_rate: fx(1.0),
        manual_yield: Some(ManualYield {
            consume: vec![],
            produce: vec![(ore, 1)],
        }),
        upgrade_costs: BTreeMap::from([
            (1, vec![(ore, 50)]),
            (
                2,
                vec![(ore, 500), (metal, 200), (energy, 100), (science, 50)],
            ),
        ]),
        tier_benefits: BTreeMap::from([(1, auto(1.0)), (2, auto(2.5))]),
    });

    // Energy -> data, with passive science as a secondary output. Only the
    // first output flows on the automated path.
    b.register_card(CardDef {
        name: "scanner".into(),
        input_requirements: vec![(energy, fx(1.0))],
        outputs: vec![data, science],
        base_rate: fx(0.3),
        manual_yield: Some(ManualYield {
            consume: vec![(energy, 5)],
            produce: vec![(data, 2)],
        }),
        upgrade_costs: BTreeMap::from([
            (1, vec![(ore, 120), (metal, 40), (energy, 25)]),
            (
                2,
                vec![
                    (ore, 1200),
                    (metal, 500),
                    (energy, 250),
                    (data, 100),
                    (science, 150),
                    (nanites, 50),
                ],
            ),
        ]),
        tier_benefits: BTreeMap::from([(1, auto(1.0)), (2, auto(2.67))]),
    });

    // Ore -> metal.
    b.register_card(CardDef {
        name: "smelter".into(),
        input_requirements: vec![(ore, fx(1.0))],
        outputs: vec![metal],
        base_rate: fx(0.4),
        manual_yield: Some(ManualYield {
            consume: vec![(ore, 5)],
            produce: vec![(metal, 2)],
        }),
        upgrade_costs: BTreeMap::from([
            (1, vec![(ore, 75), (metal, 20)]),
            (
                2,
                vec![
                    (ore, 750),
                    (metal, 300),
                    (energy, 150),
                    (data, 50),
                    (science, 75),
                ],
            ),
        ]),
        tier_benefits: BTreeMap::from([(1, auto(1.0)), (2, auto(2.5))]),
    });

    // Ore -> energy.
    b.register_card(CardDef {
        name: "reactor".into(),
        input_requirements: vec![(ore, fx(0.5))],
        outputs: vec![energy],
        base_rate: fx(0.8),
        manual_yield: Some(ManualYield {
            consume: vec![(ore, 2)],
            produce: vec![(energy, 5)],
        }),
        upgrade_costs: BTreeMap::from([
            (1, vec![(ore, 100), (metal, 30)]),
            (2, vec![(ore, 1000), (metal, 400), (energy, 200), (science, 100)]),
        ]),
        tier_benefits: BTreeMap::from([(1, auto(1.0)), (2, auto(2.5))]),
    });

    // Metal + energy -> nanites.
    b.register_card(CardDef {
        name: "fabricator".into(),
        input_requirements: vec![(metal, fx(0.5)), (energy, fx(0.3))],
        outputs: vec![nanites],
        base_rate: fx(0.15),
        manual_yield: Some(ManualYield {
            consume: vec![(metal, 3), (energy, 2)],
            produce: vec![(nanites, 1)],
        }),
        upgrade_costs: BTreeMap::from([
            (
                1,
                vec![
                    (ore, 250),
                    (metal, 100),
                    (energy, 60),
                    (data, 30),
                    (science, 20),
                    (bloom, 40),
                ],
            ),
            (
                2,
                vec![
                    (ore, 2500),
                    (metal, 1000),
                    (energy, 600),
                    (data, 300),
                    (science, 250),
                    (bloom, 400),
                    (nanites, 200),
                ],
            ),
        ]),
        tier_benefits: BTreeMap::from([(1, auto(1.0)), (2, auto(2.67))]),
    });

    // Energy -> bloom.
    b.register_card(CardDef {
        name: "cultivator".into(),
        input_requirements: vec![(energy, fx(1.0))],
        outputs: vec![bloom],
        base_rate: fx(0.3),
        manual_yield: Some(ManualYield {
            consume: vec![(energy, 5)],
            produce: vec![(bloom, 2)],
        }),
        upgrade_costs: BTreeMap::from([
            (1, vec![(ore, 180), (metal, 60), (energy, 40), (bloom, 30)]),
            (
                2,
                vec![
                    (ore, 1800),
                    (metal, 700),
                    (energy, 400),
                    (science, 150),
                    (bloom, 300),
                    (nanites, 100),
                ],
            ),
        ]),
        tier_benefits: BTreeMap::from([(1, auto(1.0)), (2, auto(2.67))]),
    });

    // Data + energy -> science. Tier 1 deliberately costs no science so the
    // research chain can bootstrap.
    b.register_card(CardDef {
        name: "lab".into(),
        input_requirements: vec![(data, fx(0.5)), (energy, fx(0.5))],
        outputs: vec![science],
        base_rate: fx(0.2),
        manual_yield: Some(ManualYield {
            consume: vec![(data, 3), (energy, 3)],
            produce: vec![(science, 1)],
        }),
        upgrade_costs: BTreeMap::from([
            (1, vec![(ore, 150), (metal, 50), (energy, 30), (data, 20)]),
            (
                2,
                vec![
                    (ore, 1500),
                    (metal, 600),
                    (energy, 300),
                    (data, 200),
                    (science, 200),
                    (nanites, 75),
                ],
            ),
        ]),
        tier_benefits: BTreeMap::from([(1, auto(1.0)), (2, auto(3.0))]),
    });

    // Passive storage card: no production, no manual action.
    b.register_card(CardDef {
        name: "depot".into(),
        input_requirements: vec![],
        outputs: vec![],
        base_rate: fx(0.0),
        manual_yield: None,
        upgrade_costs: BTreeMap::from([
            (1, vec![(ore, 200), (metal, 80), (energy, 50)]),
            (
                2,
                vec![
                    (ore, 2000),
                    (metal, 800),
                    (energy, 500),
                    (science, 200),
                    (nanites, 150),
                ],
            ),
        ]),
        tier_benefits: BTreeMap::from([(1, passive()), (2, passive())]),
    });

    b.set_grid(4, 5);
    b.set_starter_card("extractor")
        .expect("extractor registered above");
    b.build().expect("default configuration is well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = default_config();
        assert_eq!(config.resource_count(), 7);
        assert_eq!(config.card_count(), 8);
        assert_eq!(config.grid_rows(), 4);
        assert_eq!(config.grid_cols(), 5);
        assert_eq!(config.starter_card(), config.card_id("extractor").unwrap());
    }

    #[test]
    fn every_card_has_a_tier_one_upgrade() {
        let config = default_config();
        for id in config.card_ids() {
            let card = config.card(id).unwrap();
            assert!(
                card.upgrade_costs.contains_key(&1),
                "{} has no tier 1 cost",
                card.name
            );
            assert!(
                card.tier_benefits.contains_key(&1),
                "{} has no tier 1 benefit",
                card.name
            );
        }
    }

    #[test]
    fn only_depot_is_passive() {
        let config = default_config();
        for id in config.card_ids() {
            let card = config.card(id).unwrap();
            let automates = card.tier_benefits.values().any(|b| b.automation);
            if card.name == "depot" {
                assert!(!automates);
                assert!(card.manual_yield.is_none());
                assert!(card.outputs.is_empty());
            } else {
                assert!(automates, "{} never automates", card.name);
                assert!(card.manual_yield.is_some(), "{} has no manual yield", card.name);
            }
        }
    }

    #[test]
    fn producers_output_what_their_yield_produces() {
        let config = default_config();
        for id in config.card_ids() {
            let card = config.card(id).unwrap();
            let Some(yield_) = &card.manual_yield else {
                continue;
            };
            // The primary output is always among the manually produced
            // resources, so the two paths reveal the same resource.
            if let Some(primary) = card.outputs.first() {
                assert!(
                    yield_.produce.iter().any(|(r, _)| r == primary),
                    "{} manual yield skips its primary output",
                    card.name
                );
            }
        }
    }
}
