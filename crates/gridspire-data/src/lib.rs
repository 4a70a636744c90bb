//! Default game content for gridspire: the eight-card configuration table
//! and the hybrid unlock rule set. The engine itself is content-agnostic;
//! everything here is plain data fed through `gridspire-core`'s builder.

pub mod cards;
pub mod unlocks;

pub use cards::default_config;
pub use unlocks::default_unlock_rules;
