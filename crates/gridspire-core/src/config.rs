//! Static game configuration: resources, cards, grid, starter card.
//!
//! Configuration is built through [`ConfigBuilder`] and frozen into an
//! immutable [`GameConfig`] before the first [`crate::state::GameState`] is
//! created. Every component takes the config by reference -- there is no
//! global table, so tests can supply their own doubles.

use crate::fixed::Fixed64;
use crate::id::{CardId, ResourceId};
use std::collections::{BTreeMap, HashMap};

/// A resource type definition.
#[derive(Debug, Clone)]
pub struct ResourceDef {
    pub name: String,
}

/// What a single manual action consumes and produces, in whole units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualYield {
    pub consume: Vec<(ResourceId, u64)>,
    pub produce: Vec<(ResourceId, u64)>,
}

/// What a tier upgrade grants once purchased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierBenefit {
    /// Whether this tier enables automated production.
    pub automation: bool,
    /// Multiplier applied to the card's base rate at this tier.
    pub rate_multiplier: Fixed64,
}

impl Default for TierBenefit {
    fn default() -> Self {
        Self {
            automation: false,
            rate_multiplier: Fixed64::ONE,
        }
    }
}

/// A card definition: the quantitative fields the simulation consumes.
/// Presentation data (labels, icons, captions) lives outside the core.
#[derive(Debug, Clone)]
pub struct CardDef {
    pub name: String,
    /// Input resource -> required rate. Throttles throughput via efficiency;
    /// automated production does not deduct these.
    pub input_requirements: Vec<(ResourceId, Fixed64)>,
    /// Output resources, in declaration order. Automated flow uses the first.
    pub outputs: Vec<ResourceId>,
    /// Whole units produced per second at tier 1 with 100% efficiency.
    pub base_rate: Fixed64,
    /// Manual click yield; `None` for passive cards.
    pub manual_yield: Option<ManualYield>,
    /// Tier -> cost map, checked against settled amounts.
    pub upgrade_costs: BTreeMap<u32, Vec<(ResourceId, u64)>>,
    /// Tier -> benefit descriptor.
    pub tier_benefits: BTreeMap<u32, TierBenefit>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("invalid resource reference: {0:?}")]
    InvalidResourceRef(ResourceId),
    #[error("no starter card designated")]
    MissingStarterCard,
    #[error("grid dimensions must be non-zero, got {rows}x{cols}")]
    BadGrid { rows: u32, cols: u32 },
}

/// Builder for constructing an immutable [`GameConfig`].
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug)]
pub struct ConfigBuilder {
    resources: Vec<ResourceDef>,
    resource_name_to_id: HashMap<String, ResourceId>,
    cards: Vec<CardDef>,
    card_name_to_id: HashMap<String, CardId>,
    grid_rows: u32,
    grid_cols: u32,
    starter_card: Option<CardId>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
            resource_name_to_id: HashMap::new(),
            cards: Vec::new(),
            card_name_to_id: HashMap::new(),
            grid_rows: 4,
            grid_cols: 5,
            starter_card: None,
        }
    }

    /// Phase 1: Register a resource type. Returns its ID.
    pub fn register_resource(&mut self, name: &str) -> ResourceId {
        let id = ResourceId(self.resources.len() as u32);
        self.resources.push(ResourceDef {
            name: name.to_string(),
        });
        self.resource_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Phase 1: Register a card. Returns its ID.
    pub fn register_card(&mut self, def: CardDef) -> CardId {
        let id = CardId(self.cards.len() as u32);
        self.card_name_to_id.insert(def.name.clone(), id);
        self.cards.push(def);
        id
    }

    /// Phase 2: Mutate an existing card definition by name.
    pub fn mutate_card<F>(&mut self, name: &str, f: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut CardDef),
    {
        let id = self
            .card_name_to_id
            .get(name)
            .ok_or(ConfigError::NotFound(name.to_string()))?;
        f(&mut self.cards[id.0 as usize]);
        Ok(())
    }

    /// Set the placement grid dimensions.
    pub fn set_grid(&mut self, rows: u32, cols: u32) {
        self.grid_rows = rows;
        self.grid_cols = cols;
    }

    /// Designate the always-unlocked starter card.
    pub fn set_starter_card(&mut self, name: &str) -> Result<(), ConfigError> {
        let id = self
            .card_name_to_id
            .get(name)
            .ok_or(ConfigError::NotFound(name.to_string()))?;
        self.starter_card = Some(*id);
        Ok(())
    }

    /// Lookup resource ID by name.
    pub fn resource_id(&self, name: &str) -> Option<ResourceId> {
        self.resource_name_to_id.get(name).copied()
    }

    /// Lookup card ID by name.
    pub fn card_id(&self, name: &str) -> Option<CardId> {
        self.card_name_to_id.get(name).copied()
    }

    /// Phase 3: Finalize and build the immutable config.
    pub fn build(self) -> Result<GameConfig, ConfigError> {
        if self.grid_rows == 0 || self.grid_cols == 0 {
            return Err(ConfigError::BadGrid {
                rows: self.grid_rows,
                cols: self.grid_cols,
            });
        }

        // Names must be unique -- the save format is name-keyed.
        if self.resource_name_to_id.len() != self.resources.len() {
            let dup = find_duplicate(self.resources.iter().map(|r| r.name.as_str()));
            return Err(ConfigError::DuplicateName(dup));
        }
        if self.card_name_to_id.len() != self.cards.len() {
            let dup = find_duplicate(self.cards.iter().map(|c| c.name.as_str()));
            return Err(ConfigError::DuplicateName(dup));
        }

        // Every resource a card references must exist.
        let resource_count = self.resources.len() as u32;
        for card in &self.cards {
            let refs = card
                .input_requirements
                .iter()
                .map(|(r, _)| *r)
                .chain(card.outputs.iter().copied())
                .chain(card.manual_yield.iter().flat_map(|y| {
                    y.consume
                        .iter()
                        .chain(y.produce.iter())
                        .map(|(r, _)| *r)
                }))
                .chain(
                    card.upgrade_costs
                        .values()
                        .flat_map(|costs| costs.iter().map(|(r, _)| *r)),
                );
            for r in refs {
                if r.0 >= resource_count {
                    return Err(ConfigError::InvalidResourceRef(r));
                }
            }
        }

        let starter_card = self.starter_card.ok_or(ConfigError::MissingStarterCard)?;

        Ok(GameConfig {
            resources: self.resources,
            resource_name_to_id: self.resource_name_to_id,
            cards: self.cards,
            card_name_to_id: self.card_name_to_id,
            grid_rows: self.grid_rows,
            grid_cols: self.grid_cols,
            starter_card,
        })
    }
}

fn find_duplicate<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return name.to_string();
        }
    }
    String::new()
}

/// Immutable configuration. Frozen after `build()`.
#[derive(Debug)]
pub struct GameConfig {
    resources: Vec<ResourceDef>,
    resource_name_to_id: HashMap<String, ResourceId>,
    cards: Vec<CardDef>,
    card_name_to_id: HashMap<String, CardId>,
    grid_rows: u32,
    grid_cols: u32,
    starter_card: CardId,
}

impl GameConfig {
    pub fn resource(&self, id: ResourceId) -> Option<&ResourceDef> {
        self.resources.get(id.0 as usize)
    }

    pub fn card(&self, id: CardId) -> Option<&CardDef> {
        self.cards.get(id.0 as usize)
    }

    pub fn resource_id(&self, name: &str) -> Option<ResourceId> {
        self.resource_name_to_id.get(name).copied()
    }

    pub fn card_id(&self, name: &str) -> Option<CardId> {
        self.card_name_to_id.get(name).copied()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    pub fn resource_ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        (0..self.resources.len() as u32).map(ResourceId)
    }

    pub fn card_ids(&self) -> impl Iterator<Item = CardId> + '_ {
        (0..self.cards.len() as u32).map(CardId)
    }

    pub fn grid_rows(&self) -> u32 {
        self.grid_rows
    }

    pub fn grid_cols(&self) -> u32 {
        self.grid_cols
    }

    /// The designated always-unlocked starter card.
    pub fn starter_card(&self) -> CardId {
        self.starter_card
    }
}
