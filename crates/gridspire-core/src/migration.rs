//! Save-record version migration framework.
//!
//! A registry of migration functions transforms a [`SaveRecord`] from one
//! schema version to the next, enabling old saves to load when the format
//! grows fields. Each registered function migrates `version N` to
//! `version N + 1`; the registry chains steps to cross multiple versions.
//! Steps only fill fields that are absent, so re-applying a step to an
//! already-migrated record is a no-op.

use crate::config::GameConfig;
use crate::serialize::SaveRecord;
use std::collections::BTreeMap;

/// Errors that can occur during migration.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("no migration path from version {from} to version {to}")]
    NoMigrationPath { from: u32, to: u32 },
    #[error("migration from version {from} to version {to} failed: {reason}")]
    MigrationFailed { from: u32, to: u32, reason: String },
    #[error("save is from future version {0} (this build supports up to {1})")]
    FutureVersion(u32, u32),
}

/// A function that migrates a record from one version to the next.
pub type MigrationFn = fn(&mut SaveRecord, &GameConfig) -> Result<(), MigrationError>;

/// Registry of migration functions keyed by source version.
pub struct MigrationRegistry {
    migrations: BTreeMap<u32, MigrationFn>,
}

impl MigrationRegistry {
    /// Create an empty migration registry.
    pub fn new() -> Self {
        Self {
            migrations: BTreeMap::new(),
        }
    }

    /// Create a registry with the built-in migration chain registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(1, migrate_v1_to_v2);
        registry
    }

    /// Register a migration function from `from_version` to `from_version + 1`.
    pub fn register(&mut self, from_version: u32, migrate: MigrationFn) {
        self.migrations.insert(from_version, migrate);
    }

    /// Check whether a complete migration path exists from `from` to `to`.
    pub fn can_migrate(&self, from: u32, to: u32) -> bool {
        if from >= to {
            return from == to;
        }
        (from..to).all(|v| self.migrations.contains_key(&v))
    }

    /// Migrate a record upward to version `to`, chaining registered steps.
    /// A record already at `to` is returned unchanged; a record from a
    /// future version is refused.
    pub fn migrate(
        &self,
        record: &mut SaveRecord,
        config: &GameConfig,
        to: u32,
    ) -> Result<(), MigrationError> {
        let from = record.version;
        if from == to {
            return Ok(());
        }
        if from > to {
            return Err(MigrationError::FutureVersion(from, to));
        }
        for version in from..to {
            let migrate_fn = self
                .migrations
                .get(&version)
                .ok_or(MigrationError::NoMigrationPath { from, to })?;
            migrate_fn(record, config)?;
            record.version = version + 1;
        }
        Ok(())
    }

    /// Number of registered migration steps.
    pub fn step_count(&self) -> usize {
        self.migrations.len()
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// v1 -> v2: adds the per-card `unlocked` flag (defaulting only the starter
/// card to true) and synthesizes the discovered-resource set from resources
/// already above zero.
fn migrate_v1_to_v2(record: &mut SaveRecord, config: &GameConfig) -> Result<(), MigrationError> {
    let starter_name = config
        .card(config.starter_card())
        .map(|c| c.name.clone())
        .unwrap_or_default();

    for (name, card) in record.cards.iter_mut() {
        if card.unlocked.is_none() {
            card.unlocked = Some(*name == starter_name);
        }
    }

    if record.discovered_resources.is_none() {
        let discovered: Vec<String> = record
            .resources
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(name, _)| name.clone())
            .collect();
        record.discovered_resources = Some(discovered);
    }

    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
