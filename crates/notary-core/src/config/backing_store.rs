//! Backing store selection.

use serde::{Deserialize, Serialize};

/// Which storage engine holds state and transaction details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackingStoreKind {
    /// PostgreSQL via sqlx.
    Postgres,
    /// Process-local tables; contents are lost on restart.
    Memory,
}

/// Backing store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackingStoreConfig {
    /// Storage engine.
    #[serde(default = "default_kind")]
    pub kind: BackingStoreKind,
    /// Whether to apply bundled migrations at startup.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for BackingStoreConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            run_migrations: default_true(),
        }
    }
}

fn default_kind() -> BackingStoreKind {
    BackingStoreKind::Postgres
}

fn default_true() -> bool {
    true
}
