//! Entry service
//!
//! Implements business logic for weblog entries:
//! - Creation with a slug derived from the title, unique per publication day
//! - Partial updates that never regenerate the slug
//! - Author and status changes
//! - Queryset-driven listing and date/slug lookup
//!
//! Permission checks are not done here; callers consult the permission
//! handler before invoking a mutating operation.

use crate::db::repositories::{EntryRepository, SiteRepository, UserRepository};
use crate::models::{CreateEntryInput, Entry, EntryQuery, EntryStatus, UpdateEntryInput, TITLE_MAX_LENGTH};
use crate::services::slug::{numbered_slug, slugify, FALLBACK_SLUG};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

/// Error types for entry service operations
#[derive(Debug, thiserror::Error)]
pub enum EntryServiceError {
    /// Entry not found
    #[error("Entry not found: {0}")]
    NotFound(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Referenced site does not exist
    #[error("Unknown site: {0}")]
    UnknownSite(i64),

    /// Referenced user does not exist
    #[error("Unknown user: {0}")]
    UnknownUser(i64),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Entry service for managing weblog entries
pub struct EntryService {
    repo: Arc<dyn EntryRepository>,
    site_repo: Arc<dyn SiteRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl EntryService {
    /// Create a new entry service
    pub fn new(
        repo: Arc<dyn EntryRepository>,
        site_repo: Arc<dyn SiteRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            repo,
            site_repo,
            user_repo,
        }
    }

    /// Create an entry published now.
    ///
    /// The slug comes from `input.slug`, or from the title when that is
    /// blank, and gets a `-2`, `-3`… suffix when another entry already uses
    /// it on the same day. A title with no usable characters yields `entry`.
    pub async fn create(&self, mut input: CreateEntryInput) -> Result<Entry, EntryServiceError> {
        validate_title(&input.title)?;
        self.validate_sites(&input.sites).await?;
        for user_id in &input.author_ids {
            self.ensure_user(*user_id).await?;
        }

        let now = Utc::now();
        let source = if input.slug.trim().is_empty() { &input.title } else { &input.slug };
        let mut base = slugify(source);
        if base.is_empty() {
            base = FALLBACK_SLUG.to_string();
        }
        input.slug = self.unique_slug(&base, now.date_naive()).await?;
        input.title = input.title.trim().to_string();

        let entry = self
            .repo
            .create(&input, now)
            .await
            .context("Failed to create entry")?;

        info!(entry_id = entry.id, slug = %entry.slug, "Entry created");
        Ok(entry)
    }

    /// Apply a partial update and credit `editor_id` as an author.
    pub async fn update(
        &self,
        id: i64,
        input: UpdateEntryInput,
        editor_id: Option<i64>,
    ) -> Result<Entry, EntryServiceError> {
        let mut entry = self.get_required(id).await?;

        if let Some(title) = input.title {
            validate_title(&title)?;
            entry.title = title.trim().to_string();
        }
        if let Some(lead) = input.lead {
            entry.lead = lead;
        }
        if let Some(excerpt) = input.excerpt {
            entry.excerpt = excerpt;
        }
        if let Some(content) = input.content {
            entry.content = content;
        }
        if let Some(status) = input.status {
            entry.status = status;
        }
        if let Some(comment_enabled) = input.comment_enabled {
            entry.comment_enabled = comment_enabled;
        }
        if let Some(sites) = input.sites {
            self.validate_sites(&sites).await?;
            entry.sites = sites;
        }

        self.repo.update(&entry).await.context("Failed to update entry")?;
        if let Some(user_id) = editor_id {
            self.repo
                .add_author(id, user_id)
                .await
                .context("Failed to credit editor")?;
        }

        info!(entry_id = id, "Entry updated");
        self.get_required(id).await
    }

    /// Get entry by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Entry>, EntryServiceError> {
        Ok(self.repo.get_by_id(id).await.context("Failed to get entry")?)
    }

    /// Entries selected by a queryset
    pub async fn list(&self, query: &EntryQuery) -> Result<Vec<Entry>, EntryServiceError> {
        Ok(self.repo.list(query).await.context("Failed to list entries")?)
    }

    /// Number of entries selected by a queryset
    pub async fn count(&self, query: &EntryQuery) -> Result<i64, EntryServiceError> {
        Ok(self.repo.count(query).await.context("Failed to count entries")?)
    }

    /// Entry in `query` published on `date` under `slug`
    pub async fn find_by_date_and_slug(
        &self,
        query: &EntryQuery,
        date: NaiveDate,
        slug: &str,
    ) -> Result<Option<Entry>, EntryServiceError> {
        Ok(self
            .repo
            .get_by_date_and_slug(query, date, slug)
            .await
            .context("Failed to look up entry")?)
    }

    /// Change only the status
    pub async fn set_status(&self, id: i64, status: EntryStatus) -> Result<Entry, EntryServiceError> {
        self.get_required(id).await?;
        self.repo
            .set_status(id, status)
            .await
            .context("Failed to set entry status")?;
        info!(entry_id = id, status = %status, "Entry status changed");
        self.get_required(id).await
    }

    /// Replace the author set. At least one author is required.
    pub async fn set_authors(&self, id: i64, user_ids: &[i64]) -> Result<Entry, EntryServiceError> {
        if user_ids.is_empty() {
            return Err(EntryServiceError::ValidationError(
                "An entry needs at least one author".to_string(),
            ));
        }
        self.get_required(id).await?;
        for user_id in user_ids {
            self.ensure_user(*user_id).await?;
        }

        self.repo
            .set_authors(id, user_ids)
            .await
            .context("Failed to set entry authors")?;
        info!(entry_id = id, authors = ?user_ids, "Entry authors changed");
        self.get_required(id).await
    }

    async fn get_required(&self, id: i64) -> Result<Entry, EntryServiceError> {
        self.get_by_id(id).await?.ok_or(EntryServiceError::NotFound(id))
    }

    async fn unique_slug(&self, base: &str, date: NaiveDate) -> Result<String, EntryServiceError> {
        let mut attempt = 1;
        loop {
            let candidate = numbered_slug(base, attempt);
            let taken = self
                .repo
                .slug_exists_on_date(&candidate, date)
                .await
                .context("Failed to check slug uniqueness")?;
            if !taken {
                return Ok(candidate);
            }
            attempt += 1;
        }
    }

    async fn validate_sites(&self, sites: &[i64]) -> Result<(), EntryServiceError> {
        if sites.is_empty() {
            return Err(EntryServiceError::ValidationError(
                "An entry must be attached to at least one site".to_string(),
            ));
        }
        for site_id in sites {
            let exists = self
                .site_repo
                .get_by_id(*site_id)
                .await
                .context("Failed to look up site")?
                .is_some();
            if !exists {
                return Err(EntryServiceError::UnknownSite(*site_id));
            }
        }
        Ok(())
    }

    async fn ensure_user(&self, user_id: i64) -> Result<(), EntryServiceError> {
        let exists = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to look up user")?
            .is_some();
        if exists {
            Ok(())
        } else {
            Err(EntryServiceError::UnknownUser(user_id))
        }
    }
}

fn validate_title(title: &str) -> Result<(), EntryServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(EntryServiceError::ValidationError("Title cannot be empty".to_string()));
    }
    if title.chars().count() > TITLE_MAX_LENGTH {
        return Err(EntryServiceError::ValidationError(format!(
            "Title cannot exceed {} characters",
            TITLE_MAX_LENGTH
        )));
    }
    Ok(())
}
