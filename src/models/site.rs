//! Site model

use serde::{Deserialize, Serialize};

/// Site ID seeded by the initial migration
pub const DEFAULT_SITE_ID: i64 = 1;

/// A site entries can be published on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub domain: String,
    pub name: String,
}
