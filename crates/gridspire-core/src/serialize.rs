//! Versioned save records: snapshot, validation, corruption repair, and the
//! binary wire codec.
//!
//! A [`SaveRecord`] is a structural deep copy of the live state -- it shares
//! no mutable references with the ledger. Records are name-keyed rather than
//! id-keyed so saves survive configuration reordering; unknown names are
//! skipped with a warning on restore. The binary format is `bitcode` behind
//! a magic/version pair.

use crate::config::GameConfig;
use crate::efficiency::ProductionRate;
use crate::event::Event;
use crate::fixed::{Fixed64, Millis};
use crate::id::{CardId, GridPos};
use crate::migration::{MigrationError, MigrationRegistry};
use crate::state::{CardState, GameState, Meta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a gridspire save record.
pub const SAVE_MAGIC: u32 = 0x6753_5052;

/// Current schema version. Increment when the record gains fields with
/// semantic defaults that older saves lack.
pub const SAVE_VERSION: u32 = 2;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during serialization.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur during deserialization.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SAVE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("decoding failed: {0}")]
    Decode(String),
}

/// Errors that can occur while restoring a record into live state.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("save record failed structural validation")]
    Invalid,
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    pub rows: u32,
    pub cols: u32,
}

/// Persisted per-card state. `unlocked` is `None` in v1 records; the v1->v2
/// migration fills it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSave {
    pub placed: Option<GridPos>,
    pub tier: u32,
    pub automated: bool,
    pub production: u64,
    pub unlocked: Option<bool>,
}

/// A self-describing snapshot of the whole ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub magic: u32,
    pub version: u32,
    pub timestamp: Millis,
    pub resources: BTreeMap<String, u64>,
    pub resource_carries: BTreeMap<String, Fixed64>,
    pub card_carries: BTreeMap<String, Fixed64>,
    pub production_rates: BTreeMap<String, ProductionRate>,
    pub cards: BTreeMap<String, CardSave>,
    pub grid: GridDims,
    /// `None` in v1 records; synthesized by the v1->v2 migration.
    pub discovered_resources: Option<Vec<String>>,
    pub meta: Meta,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Take a structural deep copy of the live state.
pub fn snapshot(state: &GameState, config: &GameConfig, timestamp: Millis) -> SaveRecord {
    let mut resources = BTreeMap::new();
    let mut resource_carries = BTreeMap::new();
    let mut discovered = Vec::new();
    for id in config.resource_ids() {
        let name = config.resource(id).map(|r| r.name.clone()).unwrap_or_default();
        resources.insert(name.clone(), state.resource(id));
        resource_carries.insert(name.clone(), state.carry(id));
        if state.is_discovered(id) {
            discovered.push(name);
        }
    }

    let mut cards = BTreeMap::new();
    let mut card_carries = BTreeMap::new();
    let mut production_rates = BTreeMap::new();
    for id in config.card_ids() {
        let name = config.card(id).map(|c| c.name.clone()).unwrap_or_default();
        if let Some(card) = state.card(id) {
            cards.insert(
                name.clone(),
                CardSave {
                    placed: card.placed,
                    tier: card.tier,
                    automated: card.automated,
                    production: card.production,
                    unlocked: Some(card.unlocked),
                },
            );
            card_carries.insert(name.clone(), card.carry);
        }
        if let Some(rate) = state.rate(id) {
            production_rates.insert(name, *rate);
        }
    }

    SaveRecord {
        magic: SAVE_MAGIC,
        version: SAVE_VERSION,
        timestamp,
        resources,
        resource_carries,
        card_carries,
        production_rates,
        cards,
        grid: GridDims {
            rows: state.grid_rows(),
            cols: state.grid_cols(),
        },
        discovered_resources: Some(discovered),
        meta: state.meta.clone(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Structural validation. Returns pass/fail; never panics. Settled amounts
/// and production counters are unsigned by construction, so the remaining
/// checks are the ones the type system cannot express.
pub fn validate(record: &SaveRecord) -> bool {
    if record.magic != SAVE_MAGIC || record.version == 0 {
        return false;
    }
    if record.grid.rows == 0 || record.grid.cols == 0 {
        return false;
    }
    let carry_ok = |c: &Fixed64| *c >= Fixed64::ZERO && *c < Fixed64::ONE;
    if !record.resource_carries.values().all(carry_ok) {
        return false;
    }
    if !record.card_carries.values().all(carry_ok) {
        return false;
    }
    record.production_rates.values().all(|rate| {
        rate.base_rate >= Fixed64::ZERO
            && rate.actual_rate >= Fixed64::ZERO
            && rate.efficiency >= Fixed64::ZERO
            && rate.efficiency <= Fixed64::ONE
    })
}

// ---------------------------------------------------------------------------
// Unlock-state repair
// ---------------------------------------------------------------------------

/// Post-migration consistency pass. If the always-unlocked starter card is
/// recorded as locked, or any placed card is recorded as locked (an
/// impossible state), the whole unlock-flag set resets to defaults. A
/// narrow, targeted repair: resources, grid layout, and tiers are untouched.
///
/// Returns true when a repair was applied.
pub fn recover_unlock_state(record: &mut SaveRecord, config: &GameConfig) -> bool {
    let starter_name = config
        .card(config.starter_card())
        .map(|c| c.name.clone())
        .unwrap_or_default();

    let starter_locked = record
        .cards
        .get(&starter_name)
        .is_some_and(|c| c.unlocked == Some(false));
    let placed_locked = record
        .cards
        .values()
        .any(|c| c.placed.is_some() && c.unlocked == Some(false));

    if !starter_locked && !placed_locked {
        return false;
    }

    tracing::warn!("impossible unlock state in save record; resetting unlock flags to defaults");
    for (name, card) in record.cards.iter_mut() {
        card.unlocked = Some(*name == starter_name);
    }
    true
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

/// Restore a record into live state: validate -> migrate -> repair -> staged
/// resolution -> atomic commit -> efficiency recomputation ->
/// `StateRestored`.
///
/// Any failure aborts before the first live-state mutation; the old state
/// stays authoritative.
pub fn restore(
    state: &mut GameState,
    config: &GameConfig,
    registry: &MigrationRegistry,
    mut record: SaveRecord,
) -> Result<(), RestoreError> {
    if !validate(&record) {
        tracing::warn!("save record failed validation; refusing to load");
        return Err(RestoreError::Invalid);
    }
    if record.version != SAVE_VERSION {
        registry.migrate(&mut record, config, SAVE_VERSION)?;
    }
    recover_unlock_state(&mut record, config);

    // Stage everything against the current configuration before touching
    // the live state. Unknown names are skipped with a warning.
    let mut resources = vec![0u64; config.resource_count()];
    let mut carries = vec![Fixed64::ZERO; config.resource_count()];
    let mut discovered = vec![false; config.resource_count()];
    for (name, amount) in &record.resources {
        match config.resource_id(name) {
            Some(id) => resources[id.0 as usize] = *amount,
            None => tracing::warn!(%name, "save references unknown resource; skipping"),
        }
    }
    for (name, carry) in &record.resource_carries {
        if let Some(id) = config.resource_id(name) {
            carries[id.0 as usize] = *carry;
        }
    }
    if let Some(names) = &record.discovered_resources {
        for name in names {
            if let Some(id) = config.resource_id(name) {
                discovered[id.0 as usize] = true;
            }
        }
    }

    let starter = config.starter_card();
    let mut cards: Vec<CardState> = config
        .card_ids()
        .map(|id| CardState {
            id,
            placed: None,
            tier: 0,
            automated: false,
            production: 0,
            unlocked: id == starter,
            carry: Fixed64::ZERO,
        })
        .collect();
    let mut rates = vec![None; config.card_count()];

    for (name, save) in &record.cards {
        let Some(id) = config.card_id(name) else {
            tracing::warn!(%name, "save references unknown card; skipping");
            continue;
        };
        let entry = &mut cards[id.0 as usize];
        entry.placed = save.placed.filter(|pos| {
            let inside = pos.row < record.grid.rows && pos.col < record.grid.cols;
            if !inside {
                tracing::warn!(%name, "saved placement outside grid; unplacing");
            }
            inside
        });
        entry.tier = save.tier;
        entry.automated = save.automated;
        entry.production = save.production;
        entry.unlocked = save.unlocked.unwrap_or(id == starter);
    }
    for (name, carry) in &record.card_carries {
        if let Some(id) = config.card_id(name) {
            cards[id.0 as usize].carry = *carry;
        }
    }
    for (name, rate) in &record.production_rates {
        if let Some(id) = config.card_id(name) {
            rates[id.0 as usize] = Some(*rate);
        }
    }

    // Commit. Everything past this point is infallible.
    state.resources = resources;
    state.carries = carries;
    state.discovered = discovered;
    state.cards = cards;
    state.rates = rates;
    state.efficiencies = vec![None; config.card_count()];
    state.grid_rows = record.grid.rows;
    state.grid_cols = record.grid.cols;
    state.meta = record.meta.clone();

    let active: Vec<CardId> = state
        .cards()
        .filter(|c| c.placed.is_some() && c.automated)
        .map(|c| c.id)
        .collect();
    for card in active {
        crate::efficiency::compute_efficiency(state, config, card);
    }

    state.publish(Event::StateRestored);
    Ok(())
}

// ---------------------------------------------------------------------------
// Binary codec
// ---------------------------------------------------------------------------

/// Encode a record to bytes.
pub fn encode(record: &SaveRecord) -> Result<Vec<u8>, SerializeError> {
    bitcode::serialize(record).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode a record from bytes. A corrupt or foreign payload is refused.
pub fn decode(bytes: &[u8]) -> Result<SaveRecord, DeserializeError> {
    let record: SaveRecord =
        bitcode::deserialize(bytes).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    if record.magic != SAVE_MAGIC {
        return Err(DeserializeError::InvalidMagic(record.magic));
    }
    Ok(record)
}

// ---------------------------------------------------------------------------
// JSON export/import (for backup and sharing)
// ---------------------------------------------------------------------------

/// Export a record as pretty JSON.
#[cfg(feature = "data-loader")]
pub fn export_json(record: &SaveRecord) -> Result<String, SerializeError> {
    serde_json::to_string_pretty(record).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Import a record from JSON.
#[cfg(feature = "data-loader")]
pub fn import_json(json: &str) -> Result<SaveRecord, DeserializeError> {
    let record: SaveRecord =
        serde_json::from_str(json).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    if record.magic != SAVE_MAGIC {
        return Err(DeserializeError::InvalidMagic(record.magic));
    }
    Ok(record)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::upgrade;

    fn populated_state(config: &GameConfig) -> GameState {
        let mut state = GameState::new(config);
        state.place_card(extractor(), 2, 2).unwrap();
        state.add_whole(ore(), 120).unwrap();
        state.add_fractional(ore(), fixed(0.35)).unwrap();
        state.add_whole(metal(), 8).unwrap();
        upgrade::upgrade(&mut state, config, extractor()).unwrap();
        state
    }

    // -----------------------------------------------------------------------
    // Round trip
    // -----------------------------------------------------------------------

    #[test]
    fn snapshot_restore_round_trip() {
        let config = test_config();
        let mut state = populated_state(&config);
        let record = snapshot(&state, &config, 1_000);

        // Mutate, then restore; everything snaps back.
        state.add_whole(ore(), 999).unwrap();
        state.remove_card(extractor()).unwrap();

        let registry = MigrationRegistry::with_defaults();
        restore(&mut state, &config, &registry, record.clone()).unwrap();

        assert_eq!(state.resource(ore()), 70);
        assert_eq!(state.carry(ore()), record.resource_carries["ore"]);
        assert_eq!(state.resource(metal()), 8);
        assert_eq!(
            state.card(extractor()).unwrap().placed,
            Some(crate::id::GridPos { row: 2, col: 2 })
        );
        assert_eq!(state.card(extractor()).unwrap().tier, 1);
        assert!(state.card(extractor()).unwrap().automated);
        assert!(state.is_discovered(ore()));
        assert!(state.is_discovered(metal()));
        // Automated card's efficiency was recomputed on load.
        assert!(state.efficiency(extractor()).is_some());
    }

    #[test]
    fn binary_round_trip_preserves_record() {
        let config = test_config();
        let state = populated_state(&config);
        let record = snapshot(&state, &config, 42);

        let bytes = encode(&record).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn snapshot_is_a_deep_copy() {
        let config = test_config();
        let mut state = populated_state(&config);
        let record = snapshot(&state, &config, 0);
        let before = record.resources["ore"];

        state.add_whole(ore(), 1_000).unwrap();
        assert_eq!(record.resources["ore"], before);
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn validate_accepts_fresh_snapshot() {
        let config = test_config();
        let state = GameState::new(&config);
        assert!(validate(&snapshot(&state, &config, 0)));
    }

    #[test]
    fn validate_rejects_bad_magic_and_carries() {
        let config = test_config();
        let state = GameState::new(&config);
        let good = snapshot(&state, &config, 0);

        let mut bad = good.clone();
        bad.magic = 0xDEAD_BEEF;
        assert!(!validate(&bad));

        let mut bad = good.clone();
        bad.resource_carries.insert("ore".into(), fixed(1.5));
        assert!(!validate(&bad));

        let mut bad = good.clone();
        bad.grid = GridDims { rows: 0, cols: 5 };
        assert!(!validate(&bad));

        let mut bad = good;
        bad.production_rates.insert(
            "extractor".into(),
            ProductionRate {
                base_rate: fixed(1.0),
                efficiency: fixed(1.5),
                actual_rate: fixed(1.5),
            },
        );
        assert!(!validate(&bad));
    }

    // -----------------------------------------------------------------------
    // Corruption handling
    // -----------------------------------------------------------------------

    #[test]
    fn corrupt_bytes_refuse_to_load() {
        let garbage = vec![0u8; 64];
        assert!(decode(&garbage).is_err());
    }

    #[test]
    fn invalid_record_leaves_live_state_intact() {
        let config = test_config();
        let mut state = populated_state(&config);
        let ore_before = state.resource(ore());

        let mut bad = snapshot(&state, &config, 0);
        bad.resource_carries.insert("metal".into(), fixed(2.0));

        let registry = MigrationRegistry::with_defaults();
        assert!(restore(&mut state, &config, &registry, bad).is_err());
        assert_eq!(state.resource(ore()), ore_before);
        assert_eq!(state.card(extractor()).unwrap().tier, 1);
    }

    #[test]
    fn unknown_names_are_skipped_not_fatal() {
        let config = test_config();
        let mut state = GameState::new(&config);
        let mut record = snapshot(&state, &config, 0);
        record.resources.insert("unobtainium".into(), 500);
        record.cards.insert(
            "ghost".into(),
            CardSave {
                placed: None,
                tier: 3,
                automated: false,
                production: 0,
                unlocked: Some(true),
            },
        );

        let registry = MigrationRegistry::with_defaults();
        restore(&mut state, &config, &registry, record).unwrap();
        assert_eq!(state.resource(ore()), 0);
    }

    #[test]
    fn out_of_bounds_placement_is_unplaced() {
        let config = test_config();
        let mut state = GameState::new(&config);
        let mut record = snapshot(&state, &config, 0);
        record.cards.get_mut("extractor").unwrap().placed =
            Some(crate::id::GridPos { row: 99, col: 0 });

        let registry = MigrationRegistry::with_defaults();
        restore(&mut state, &config, &registry, record).unwrap();
        assert!(state.card(extractor()).unwrap().placed.is_none());
    }

    // -----------------------------------------------------------------------
    // Unlock-state repair
    // -----------------------------------------------------------------------

    #[test]
    fn locked_starter_triggers_repair() {
        let config = test_config();
        let mut state = GameState::new(&config);
        let mut record = snapshot(&state, &config, 0);
        record.cards.get_mut("extractor").unwrap().unlocked = Some(false);
        record.cards.get_mut("smelter").unwrap().unlocked = Some(true);

        assert!(recover_unlock_state(&mut record, &config));
        assert_eq!(record.cards["extractor"].unlocked, Some(true));
        // The whole flag set resets to defaults.
        assert_eq!(record.cards["smelter"].unlocked, Some(false));
    }

    #[test]
    fn locked_placed_card_triggers_repair_preserving_progress() {
        let config = test_config();
        let mut state = GameState::new(&config);
        state.add_whole(ore(), 300).unwrap();
        state.place_card(smelter(), 1, 1).unwrap();
        let mut record = snapshot(&state, &config, 0);
        record.cards.get_mut("smelter").unwrap().unlocked = Some(false);

        assert!(recover_unlock_state(&mut record, &config));
        assert_eq!(record.cards["extractor"].unlocked, Some(true));
        // Resources and placement survive the repair untouched.
        assert_eq!(record.resources["ore"], 300);
        assert!(record.cards["smelter"].placed.is_some());
    }

    #[test]
    fn consistent_record_is_not_repaired() {
        let config = test_config();
        let state = GameState::new(&config);
        let mut record = snapshot(&state, &config, 0);
        assert!(!recover_unlock_state(&mut record, &config));
    }
}
