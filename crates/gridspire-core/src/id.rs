use serde::{Deserialize, Serialize};

/// Identifies a resource type in the configuration. Cheap to copy and compare.
///
/// Ids are assigned densely by [`crate::config::ConfigBuilder`] in
/// registration order, so they double as indices into the ledger's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

/// Identifies a card in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardId(pub u32);

/// A cell on the placement grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub row: u32,
    pub col: u32,
}
