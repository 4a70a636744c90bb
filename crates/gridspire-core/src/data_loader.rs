//! Data-driven configuration loading from JSON.
//!
//! Feature-gated behind `data-loader`. Provides JSON deserialization into
//! [`ConfigBuilder`] for game content defined in data files. All numbers
//! cross the f64 boundary here, so finiteness and sign are validated before
//! anything reaches the fixed-point interior.

use crate::config::{CardDef, ConfigBuilder, ConfigError, GameConfig, ManualYield, TierBenefit};
use crate::fixed::f64_to_fixed64;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("unknown resource reference: {0}")]
    UnknownResourceRef(String),
    #[error("invalid number for {context}: {value}")]
    InvalidNumber { context: String, value: f64 },
}

// ---------------------------------------------------------------------------
// JSON data structures
// ---------------------------------------------------------------------------

/// Top-level configuration data for JSON deserialization.
#[derive(Debug, serde::Deserialize)]
pub struct ConfigData {
    #[serde(default)]
    pub resources: Vec<ResourceData>,
    #[serde(default)]
    pub cards: Vec<CardData>,
    pub grid: GridData,
    pub starter_card: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct ResourceData {
    pub name: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct GridData {
    pub rows: u32,
    pub cols: u32,
}

#[derive(Debug, serde::Deserialize)]
pub struct CardData {
    pub name: String,
    #[serde(default)]
    pub input_requirements: BTreeMap<String, f64>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub base_rate: f64,
    #[serde(default)]
    pub manual_yield: Option<YieldData>,
    #[serde(default)]
    pub upgrade_costs: BTreeMap<u32, BTreeMap<String, u64>>,
    #[serde(default)]
    pub tier_benefits: BTreeMap<u32, BenefitData>,
}

#[derive(Debug, serde::Deserialize)]
pub struct YieldData {
    #[serde(default)]
    pub consume: BTreeMap<String, u64>,
    #[serde(default)]
    pub produce: BTreeMap<String, u64>,
}

#[derive(Debug, serde::Deserialize)]
pub struct BenefitData {
    #[serde(default)]
    pub automation: bool,
    #[serde(default = "default_multiplier")]
    pub rate_multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// Loading functions
// ---------------------------------------------------------------------------

/// Load a configuration from a JSON string.
pub fn load_config_json(json: &str) -> Result<GameConfig, DataLoadError> {
    let data: ConfigData = serde_json::from_str(json)?;
    build_config(data)
}

fn check_number(context: &str, value: f64) -> Result<f64, DataLoadError> {
    if !value.is_finite() || value < 0.0 {
        return Err(DataLoadError::InvalidNumber {
            context: context.to_string(),
            value,
        });
    }
    Ok(value)
}

fn build_config(data: ConfigData) -> Result<GameConfig, DataLoadError> {
    let mut builder = ConfigBuilder::new();

    for resource in &data.resources {
        builder.register_resource(&resource.name);
    }

    let resolve = |builder: &ConfigBuilder, name: &str| {
        builder
            .resource_id(name)
            .ok_or_else(|| DataLoadError::UnknownResourceRef(name.to_string()))
    };

    for card in &data.cards {
        let mut input_requirements = Vec::new();
        for (name, rate) in &card.input_requirements {
            let rate = check_number(&format!("{}.input_requirements.{name}", card.name), *rate)?;
            input_requirements.push((resolve(&builder, name)?, f64_to_fixed64(rate)));
        }

        let mut outputs = Vec::new();
        for name in &card.outputs {
            outputs.push(resolve(&builder, name)?);
        }

        let manual_yield = match &card.manual_yield {
            Some(yield_) => {
                let mut consume = Vec::new();
                for (name, amount) in &yield_.consume {
                    consume.push((resolve(&builder, name)?, *amount));
                }
                let mut produce = Vec::new();
                for (name, amount) in &yield_.produce {
                    produce.push((resolve(&builder, name)?, *amount));
                }
                Some(ManualYield { consume, produce })
            }
            None => None,
        };

        let mut upgrade_costs = BTreeMap::new();
        for (tier, costs) in &card.upgrade_costs {
            let mut resolved = Vec::new();
            for (name, amount) in costs {
                resolved.push((resolve(&builder, name)?, *amount));
            }
            upgrade_costs.insert(*tier, resolved);
        }

        let mut tier_benefits = BTreeMap::new();
        for (tier, benefit) in &card.tier_benefits {
            let multiplier = check_number(
                &format!("{}.tier_benefits.{tier}.rate_multiplier", card.name),
                benefit.rate_multiplier,
            )?;
            tier_benefits.insert(
                *tier,
                TierBenefit {
                    automation: benefit.automation,
                    rate_multiplier: f64_to_fixed64(multiplier),
                },
            );
        }

        let base_rate = check_number(&format!("{}.base_rate", card.name), card.base_rate)?;

        builder.register_card(CardDef {
            name: card.name.clone(),
            input_requirements,
            outputs,
            base_rate: f64_to_fixed64(base_rate),
            manual_yield,
            upgrade_costs,
            tier_benefits,
        });
    }

    builder.set_grid(data.grid.rows, data.grid.cols);
    builder.set_starter_card(&data.starter_card)?;
    Ok(builder.build()?)
}

// ===========================================================================
// Tests
// ===========================================================================
