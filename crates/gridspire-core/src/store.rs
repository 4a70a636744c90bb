//! Save storage: named slots, the save manager, and the auto-save timer.
//!
//! The persistence protocol owns the storage medium exclusively; the rest of
//! the engine never touches it. The medium is abstracted behind [`SaveStore`]
//! so hosts can back it with whatever they have (browser local storage, a
//! file, a test buffer). Two independent slots exist: a manual save and a
//! periodic auto-save.

use crate::config::GameConfig;
use crate::fixed::Millis;
use crate::migration::MigrationRegistry;
use crate::serialize::{self, SaveRecord};
use crate::state::GameState;

// ---------------------------------------------------------------------------
// Storage medium
// ---------------------------------------------------------------------------

/// The two independently readable/writable/deletable storage slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveSlot {
    Manual,
    Auto,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage capacity exceeded ({used} + {incoming} > {capacity} bytes)")]
    CapacityExceeded {
        used: usize,
        incoming: usize,
        capacity: usize,
    },
}

/// Abstraction over the storage medium.
pub trait SaveStore {
    fn read(&self, slot: SaveSlot) -> Option<Vec<u8>>;
    fn write(&mut self, slot: SaveSlot, bytes: Vec<u8>) -> Result<(), StoreError>;
    fn delete(&mut self, slot: SaveSlot);
}

/// In-memory store. The optional capacity models quota-limited media.
#[derive(Debug, Default)]
pub struct MemoryStore {
    manual: Option<Vec<u8>>,
    auto: Option<Vec<u8>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes once the combined slots would exceed
    /// `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    fn slot(&self, slot: SaveSlot) -> &Option<Vec<u8>> {
        match slot {
            SaveSlot::Manual => &self.manual,
            SaveSlot::Auto => &self.auto,
        }
    }

    fn slot_mut(&mut self, slot: SaveSlot) -> &mut Option<Vec<u8>> {
        match slot {
            SaveSlot::Manual => &mut self.manual,
            SaveSlot::Auto => &mut self.auto,
        }
    }
}

impl SaveStore for MemoryStore {
    fn read(&self, slot: SaveSlot) -> Option<Vec<u8>> {
        self.slot(slot).clone()
    }

    fn write(&mut self, slot: SaveSlot, bytes: Vec<u8>) -> Result<(), StoreError> {
        if let Some(capacity) = self.capacity {
            let other = match slot {
                SaveSlot::Manual => &self.auto,
                SaveSlot::Auto => &self.manual,
            };
            let used = other.as_ref().map(Vec::len).unwrap_or(0);
            if used + bytes.len() > capacity {
                return Err(StoreError::CapacityExceeded {
                    used,
                    incoming: bytes.len(),
                    capacity,
                });
            }
        }
        *self.slot_mut(slot) = Some(bytes);
        Ok(())
    }

    fn delete(&mut self, slot: SaveSlot) {
        *self.slot_mut(slot) = None;
    }
}

// ---------------------------------------------------------------------------
// Auto-save timer
// ---------------------------------------------------------------------------

/// Cooperative interval timer. The host polls it with the current time;
/// the core owns no threads and schedules nothing itself. `start` replaces
/// any running interval rather than stacking a second one.
#[derive(Debug, Default)]
pub struct AutoSaveTimer {
    interval_ms: Option<Millis>,
    last_fire: Millis,
}

impl AutoSaveTimer {
    pub fn start(&mut self, interval_ms: Millis, now_ms: Millis) {
        self.interval_ms = Some(interval_ms.max(1));
        self.last_fire = now_ms;
    }

    /// Idempotent.
    pub fn stop(&mut self) {
        self.interval_ms = None;
    }

    pub fn is_running(&self) -> bool {
        self.interval_ms.is_some()
    }

    fn due(&self, now_ms: Millis) -> bool {
        self.interval_ms
            .is_some_and(|interval| now_ms.saturating_sub(self.last_fire) >= interval)
    }

    fn mark(&mut self, now_ms: Millis) {
        self.last_fire = now_ms;
    }
}

// ---------------------------------------------------------------------------
// SaveManager
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error(transparent)]
    Serialize(#[from] serialize::SerializeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Metadata about a stored save, readable without restoring it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub version: u32,
    pub timestamp: Millis,
    pub playtime_ms: Millis,
}

impl SaveSummary {
    fn of(record: &SaveRecord) -> Self {
        Self {
            version: record.version,
            timestamp: record.timestamp,
            playtime_ms: record.meta.playtime_ms,
        }
    }
}

/// Orchestrates snapshot/encode/store on save and read/decode/restore on
/// load. A failed load of any kind refuses the record and leaves the
/// previous in-memory session fully intact.
pub struct SaveManager<S: SaveStore> {
    store: S,
    registry: MigrationRegistry,
    auto_save: AutoSaveTimer,
}

impl<S: SaveStore> SaveManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            registry: MigrationRegistry::with_defaults(),
            auto_save: AutoSaveTimer::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot the state and write it to a slot.
    pub fn save(
        &mut self,
        state: &mut GameState,
        config: &GameConfig,
        slot: SaveSlot,
        now_ms: Millis,
    ) -> Result<(), SaveError> {
        state.meta.last_save = Some(now_ms);
        let record = serialize::snapshot(state, config, now_ms);
        let bytes = serialize::encode(&record)?;
        self.store.write(slot, bytes)?;
        Ok(())
    }

    /// Load a slot into the live state. Returns `None` -- with the previous
    /// session untouched -- when the slot is empty, the payload is corrupt,
    /// or the record fails validation/migration.
    pub fn load(
        &mut self,
        state: &mut GameState,
        config: &GameConfig,
        slot: SaveSlot,
    ) -> Option<SaveSummary> {
        let bytes = self.store.read(slot)?;
        let record = match serialize::decode(&bytes) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(%err, "refusing corrupt save payload");
                return None;
            }
        };
        let summary = SaveSummary::of(&record);
        match serialize::restore(state, config, &self.registry, record) {
            Ok(()) => Some(summary),
            Err(err) => {
                tracing::warn!(%err, "refusing invalid save record");
                None
            }
        }
    }

    pub fn has_save(&self, slot: SaveSlot) -> bool {
        self.store.read(slot).is_some()
    }

    /// Peek a slot's metadata without restoring anything.
    pub fn save_info(&self, slot: SaveSlot) -> Option<SaveSummary> {
        let bytes = self.store.read(slot)?;
        serialize::decode(&bytes).ok().map(|r| SaveSummary::of(&r))
    }

    pub fn delete_save(&mut self, slot: SaveSlot) {
        self.store.delete(slot);
    }

    // -- Auto-save ----------------------------------------------------------

    /// Start auto-saving to the auto slot. Restarting replaces the interval.
    pub fn start_auto_save(&mut self, interval_ms: Millis, now_ms: Millis) {
        self.auto_save.start(interval_ms, now_ms);
    }

    pub fn stop_auto_save(&mut self) {
        self.auto_save.stop();
    }

    pub fn auto_save_running(&self) -> bool {
        self.auto_save.is_running()
    }

    /// Fire the auto-save if its interval has elapsed. Returns whether a
    /// save was written. Call from the host's frame loop.
    pub fn poll_auto_save(
        &mut self,
        state: &mut GameState,
        config: &GameConfig,
        now_ms: Millis,
    ) -> bool {
        if !self.auto_save.due(now_ms) {
            return false;
        }
        self.auto_save.mark(now_ms);
        match self.save(state, config, SaveSlot::Auto, now_ms) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "auto-save failed");
                false
            }
        }
    }

    /// Reset to a fresh session, optionally clearing both save slots.
    pub fn new_game(&mut self, state: &mut GameState, config: &GameConfig, keep_saves: bool) {
        state.reset(config);
        if !keep_saves {
            self.delete_save(SaveSlot::Manual);
            self.delete_save(SaveSlot::Auto);
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
