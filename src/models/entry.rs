//! Entry model
//!
//! This module provides:
//! - `Entry` entity representing a weblog entry
//! - `EntryStatus` enum for the entry lifecycle (draft, hidden, published)
//! - `Author` summary of a user attached to an entry
//! - Input types for creating and updating entries

use crate::config::MarkupLanguage;
use crate::services::markup::MarkupRenderer;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default URL prefix the weblog is mounted under
pub const DEFAULT_URL_PREFIX: &str = "/weblog";

/// Longest title (and slug) the `entries` columns hold, in characters
pub const TITLE_MAX_LENGTH: usize = 255;

/// Entry entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Unique identifier
    pub id: i64,
    /// Entry title
    pub title: String,
    /// URL-friendly slug, unique for a publication date
    pub slug: String,
    /// Short lead paragraph
    #[serde(default)]
    pub lead: String,
    /// Excerpt used in listings
    #[serde(default)]
    pub excerpt: String,
    /// Body (HTML or markdown, depending on the markup setting)
    #[serde(default)]
    pub content: String,
    /// Lifecycle status
    pub status: EntryStatus,
    /// Whether visitors may comment
    #[serde(default)]
    pub comment_enabled: bool,
    /// Users credited as authors
    #[serde(default)]
    pub authors: Vec<Author>,
    /// Sites the entry is published on
    #[serde(default)]
    pub sites: Vec<i64>,
    /// Publication timestamp (drives the canonical URL)
    pub publication_date: DateTime<Utc>,
    /// Creation timestamp
    pub creation_date: DateTime<Utc>,
    /// Last update timestamp
    pub last_update: DateTime<Utc>,
}

impl Entry {
    /// Whether comments can currently be posted on this entry
    pub fn comments_are_open(&self) -> bool {
        self.comment_enabled
    }

    /// Check whether the given user id is among the entry's authors
    pub fn has_author(&self, user_id: i64) -> bool {
        self.authors.iter().any(|a| a.id == user_id)
    }

    /// Check whether the entry is attached to the given site
    pub fn is_on_site(&self, site_id: i64) -> bool {
        self.sites.contains(&site_id)
    }

    /// Canonical URL under the default `/weblog` prefix
    pub fn get_absolute_url(&self) -> String {
        self.absolute_url_with_prefix(DEFAULT_URL_PREFIX)
    }

    /// Canonical URL: `<prefix>/YYYY/MM/DD/<slug>/`
    pub fn absolute_url_with_prefix(&self, prefix: &str) -> String {
        let date = self.publication_date;
        format!(
            "{}/{:04}/{:02}/{:02}/{}/",
            prefix.trim_end_matches('/'),
            date.year(),
            date.month(),
            date.day(),
            self.slug
        )
    }

    /// Content rendered in the configured markup language
    pub fn html_content(&self, markup: MarkupLanguage) -> String {
        MarkupRenderer::new(markup).render(&self.content)
    }

    /// Whether the entry was published on the given calendar day
    pub fn published_on(&self, year: i32, month: u32, day: u32) -> bool {
        let date = self.publication_date;
        date.year() == year && date.month() == month && date.day() == day
    }
}

/// Author summary attached to an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// User ID
    pub id: i64,
    /// Username
    pub username: String,
}

/// Entry lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Unpublished work in progress
    #[default]
    Draft,
    /// Suppressed from public listings
    Hidden,
    /// Visible to everyone
    Published,
}

impl EntryStatus {
    /// Every status, in form choice order
    pub const ALL: [EntryStatus; 3] = [EntryStatus::Draft, EntryStatus::Hidden, EntryStatus::Published];

    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Hidden => "hidden",
            EntryStatus::Published => "published",
        }
    }

    /// Human-readable label for form choices
    pub fn label(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "Draft",
            EntryStatus::Hidden => "Hidden",
            EntryStatus::Published => "Published",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(EntryStatus::Draft),
            "hidden" => Ok(EntryStatus::Hidden),
            "published" => Ok(EntryStatus::Published),
            _ => Err(anyhow::anyhow!("Invalid entry status: {}", s)),
        }
    }
}

/// Input for creating a new entry
#[derive(Debug, Clone)]
pub struct CreateEntryInput {
    pub title: String,
    pub slug: String,
    pub lead: String,
    pub excerpt: String,
    pub content: String,
    pub status: EntryStatus,
    pub comment_enabled: bool,
    pub sites: Vec<i64>,
    /// Initial author user IDs
    pub author_ids: Vec<i64>,
}

/// Input for updating an existing entry
///
/// `None` leaves a field unchanged. The slug is never part of an update.
#[derive(Debug, Clone, Default)]
pub struct UpdateEntryInput {
    pub title: Option<String>,
    pub lead: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub status: Option<EntryStatus>,
    pub comment_enabled: Option<bool>,
    pub sites: Option<Vec<i64>>,
}

impl UpdateEntryInput {
    /// Check if any field is set
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.lead.is_some()
            || self.excerpt.is_some()
            || self.content.is_some()
            || self.status.is_some()
            || self.comment_enabled.is_some()
            || self.sites.is_some()
    }
}

#[cfg(test)]
pub(crate) fn sample_entry(id: i64, status: EntryStatus, author_ids: &[i64]) -> Entry {
    use chrono::TimeZone;

    let date = Utc.with_ymd_and_hms(2024, 3, 9, 10, 30, 0).unwrap();
    Entry {
        id,
        title: format!("Entry {}", id),
        slug: format!("entry-{}", id),
        lead: String::new(),
        excerpt: String::new(),
        content: String::new(),
        status,
        comment_enabled: false,
        authors: author_ids
            .iter()
            .map(|&id| Author { id, username: format!("user{}", id) })
            .collect(),
        sites: vec![1],
        publication_date: date,
        creation_date: date,
        last_update: date,
    }
}
