//! Category model
//!
//! Categories form a taxonomy over entries. They are only created, changed
//! or deleted through permission-gated admin endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier
    pub id: i64,
    /// Display title
    pub title: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    /// Optional description
    #[serde(default)]
    pub description: String,
    /// Parent category ID (None for root categories)
    pub parent_id: Option<i64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for creating a category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCategoryInput {
    pub title: String,
    /// Derived from the title when empty
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// Input for updating a category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCategoryInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` detaches from the parent
    #[serde(default, with = "double_option")]
    pub parent_id: Option<Option<i64>>,
}

impl UpdateCategoryInput {
    pub fn has_changes(&self) -> bool {
        self.title.is_some() || self.slug.is_some() || self.description.is_some() || self.parent_id.is_some()
    }
}

/// Distinguish an absent field from an explicit `null`
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Option<i64>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<i64>::deserialize(deserializer).map(Some)
    }
}
