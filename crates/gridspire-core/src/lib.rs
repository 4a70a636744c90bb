//! Gridspire Core -- the simulation engine for grid-based incremental games.
//!
//! This crate provides the authoritative resource ledger, the typed event
//! bus, fractional production scheduling, efficiency/bottleneck computation,
//! tier-upgrade transactions, rule-driven unlock progression, rate-limited
//! manual actions, and the versioned persistence protocol that a view layer
//! builds on. Rendering, input handling, and presentation data live outside
//! this crate entirely.
//!
//! # Execution Model
//!
//! Single-threaded, cooperative, frame-driven. The host calls
//! [`scheduler::Scheduler::tick`] with the wall-clock delta between frames
//! and supplies timestamps to the manual-action gate and save manager; the
//! core performs no I/O and never reads a clock. Every mutation is one
//! synchronous read-check-write-publish step, so event handlers may trigger
//! further mutations without corrupting state.
//!
//! # Key Types
//!
//! - [`state::GameState`] -- authoritative ledger and card table; owns the bus.
//! - [`config::GameConfig`] -- frozen quantitative configuration, built via
//!   [`config::ConfigBuilder`] and injected everywhere (no globals).
//! - [`event::EventBus`] -- synchronous typed pub/sub with passive listeners
//!   and reactive handlers.
//! - [`scheduler::Scheduler`] -- per-frame production with a cached active set.
//! - [`click::ClickGate`] -- rate-limited manual actions.
//! - [`upgrade`] -- atomic tier-upgrade transactions.
//! - [`unlock::UnlockRuleSet`] -- sequential + milestone unlock rules.
//! - [`serialize`] / [`migration`] / [`store`] -- versioned save records,
//!   upward migration, corruption repair, and slot storage.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for carries and rates.

pub mod click;
pub mod config;
#[cfg(feature = "data-loader")]
pub mod data_loader;
pub mod efficiency;
pub mod event;
pub mod fixed;
pub mod id;
pub mod migration;
pub mod scheduler;
pub mod serialize;
pub mod state;
pub mod store;
pub mod unlock;
pub mod upgrade;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
