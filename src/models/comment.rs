//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment left by an authenticated user on an entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub entry_id: i64,
    pub user_id: i64,
    /// Author username, joined in when listing
    #[serde(default)]
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for posting a comment
#[derive(Debug, Clone)]
pub struct CreateCommentInput {
    pub entry_id: i64,
    pub user_id: i64,
    pub content: String,
}
