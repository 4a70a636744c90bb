//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available everywhere tests run (and in benches via the `test-utils`
//! feature).

use crate::config::{CardDef, ConfigBuilder, GameConfig, ManualYield, TierBenefit};
use crate::fixed::Fixed64;
use crate::id::{CardId, ResourceId};
use std::collections::BTreeMap;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Id constructors -- valid for the config built by `test_config`
// ===========================================================================

pub fn ore() -> ResourceId {
    ResourceId(0)
}
pub fn metal() -> ResourceId {
    ResourceId(1)
}
pub fn energy() -> ResourceId {
    ResourceId(2)
}
pub fn data() -> ResourceId {
    ResourceId(3)
}

pub fn extractor() -> CardId {
    CardId(0)
}
pub fn smelter() -> CardId {
    CardId(1)
}
pub fn reactor() -> CardId {
    CardId(2)
}
pub fn assembler() -> CardId {
    CardId(3)
}
pub fn depot() -> CardId {
    CardId(4)
}

// ===========================================================================
// Fixture configuration
// ===========================================================================

/// A small five-card configuration covering the interesting shapes: a
/// zero-input producer, two single-input converters, a multi-input
/// converter, and a passive card. Extractor is the starter; 4x5 grid.
pub fn test_config() -> GameConfig {
    let mut b = ConfigBuilder::new();
    let ore = b.register_resource("ore");
    let metal = b.register_resource("metal");
    let energy = b.register_resource("energy");
    let data = b.register_resource("data");

    b.register_card(CardDef {
        name: "extractor".into(),
        input_requirements: vec![],
        outputs: vec![ore],
        base_rate: fixed(1.0),
        manual_yield: Some(ManualYield {
            consume: vec![],
            produce: vec![(ore, 1)],
        }),
        upgrade_costs: BTreeMap::from([
            (1, vec![(ore, 50)]),
            (2, vec![(ore, 500), (metal, 200)]),
        ]),
        tier_benefits: BTreeMap::from([
            (
                1,
                TierBenefit {
                    automation: true,
                    rate_multiplier: fixed(1.0),
                },
            ),
            (
                2,
                TierBenefit {
                    automation: true,
                    rate_multiplier: fixed(2.5),
                },
            ),
        ]),
    });

    b.register_card(CardDef {
        name: "smelter".into(),
        input_requirements: vec![(ore, fixed(1.0))],
        outputs: vec![metal],
        base_rate: fixed(0.4),
        manual_yield: Some(ManualYield {
            consume: vec![(ore, 5)],
            produce: vec![(metal, 2)],
        }),
        upgrade_costs: BTreeMap::from([(1, vec![(ore, 75), (metal, 20)])]),
        tier_benefits: BTreeMap::from([(
            1,
            TierBenefit {
                automation: true,
                rate_multiplier: fixed(1.0),
            },
        )]),
    });

    b.register_card(CardDef {
        name: "reactor".into(),
        input_requirements: vec![(ore, fixed(0.5))],
        outputs: vec![energy],
        base_rate: fixed(0.8),
        manual_yield: Some(ManualYield {
            consume: vec![(ore, 2)],
            produce: vec![(energy, 5)],
        }),
        upgrade_costs: BTreeMap::from([(1, vec![(ore, 100), (metal, 30)])]),
        tier_benefits: BTreeMap::from([(
            1,
            TierBenefit {
                automation: true,
                rate_multiplier: fixed(1.0),
            },
        )]),
    });

    b.register_card(CardDef {
        name: "assembler".into(),
        input_requirements: vec![(metal, fixed(5.0)), (energy, fixed(1.0))],
        outputs: vec![data],
        base_rate: fixed(0.2),
        manual_yield: Some(ManualYield {
            consume: vec![(metal, 3), (energy, 2)],
            produce: vec![(data, 1)],
        }),
        upgrade_costs: BTreeMap::from([(1, vec![(ore, 150), (metal, 60)])]),
        tier_benefits: BTreeMap::from([(
            1,
            TierBenefit {
                automation: true,
                rate_multiplier: fixed(1.0),
            },
        )]),
    });

    // Passive card: no production, no manual yield.
    b.register_card(CardDef {
        name: "depot".into(),
        input_requirements: vec![],
        outputs: vec![],
        base_rate: fixed(0.0),
        manual_yield: None,
        upgrade_costs: BTreeMap::from([(1, vec![(ore, 200)])]),
        tier_benefits: BTreeMap::from([(
            1,
            TierBenefit {
                automation: false,
                rate_multiplier: fixed(1.0),
            },
        )]),
    });

    b.set_starter_card("extractor").unwrap();
    b.set_grid(4, 5);
    b.build().unwrap()
}
