//! Entry API endpoints
//!
//! - GET /api/v1/entries - Entries visible to the caller
//! - PUT /api/v1/entries/{id}/authors - Replace the authors
//! - PUT /api/v1/entries/{id}/status - Change the status

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, CurrentPrincipal};
use crate::models::{Author, Entry, EntryQuery, EntryStatus, Principal};

/// Query parameters for listing entries
#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    /// Narrow to one status; the permission filter still applies
    pub status: Option<EntryStatus>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 { 1 }
fn default_page_size() -> i64 { 20 }

/// Request body for replacing authors
#[derive(Debug, Deserialize)]
pub struct SetAuthorsRequest {
    pub authors: Vec<i64>,
}

/// Request body for changing the status
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: EntryStatus,
}

/// Entry as exposed by the API
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub status: EntryStatus,
    pub url: String,
    pub excerpt: String,
    pub comment_enabled: bool,
    pub authors: Vec<Author>,
    pub sites: Vec<i64>,
    pub publication_date: String,
    pub last_update: String,
}

impl EntryResponse {
    fn new(entry: Entry, prefix: &str) -> Self {
        Self {
            url: entry.absolute_url_with_prefix(prefix),
            id: entry.id,
            title: entry.title,
            slug: entry.slug,
            status: entry.status,
            excerpt: entry.excerpt,
            comment_enabled: entry.comment_enabled,
            authors: entry.authors,
            sites: entry.sites,
            publication_date: entry.publication_date.to_rfc3339(),
            last_update: entry.last_update.to_rfc3339(),
        }
    }
}

/// Response for entry list
#[derive(Debug, Serialize)]
pub struct EntryListResponse {
    pub entries: Vec<EntryResponse>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Build the entries router; mutating handlers authenticate via `AuthenticatedUser`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_entries))
        .route("/{id}/authors", put(set_authors))
        .route("/{id}/status", put(set_status))
}

/// GET /api/v1/entries
async fn list_entries(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(params): Query<ListEntriesQuery>,
) -> Result<Json<EntryListResponse>, ApiError> {
    let page = params.page.max(1);
    let page_size = params.page_size.clamp(1, 100);

    let mut query = EntryQuery::all().on_site(state.site_id());
    if let Some(status) = params.status {
        query = query.filter_status(status);
    }
    let query = state.permissions.filter_entries(&principal, query);

    let total = state.entry_service.count(&query).await?;
    let entries = state
        .entry_service
        .list(&query.limit(page_size).offset((page - 1) * page_size))
        .await?;

    let prefix = state.weblog_prefix();
    Ok(Json(EntryListResponse {
        entries: entries.into_iter().map(|e| EntryResponse::new(e, prefix)).collect(),
        total,
        page,
        page_size,
    }))
}

async fn load_entry(state: &AppState, id: i64) -> Result<Entry, ApiError> {
    state
        .entry_service
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Entry {} not found", id)))
}

/// PUT /api/v1/entries/{id}/authors
async fn set_authors(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SetAuthorsRequest>,
) -> Result<Json<EntryResponse>, ApiError> {
    let entry = load_entry(&state, id).await?;
    let principal = Principal::User(user);
    if !state.permissions.can_change_authors(&principal, &entry) {
        return Err(ApiError::forbidden("You may not change the authors of this entry"));
    }

    let entry = state.entry_service.set_authors(id, &body.authors).await?;
    info!(entry_id = id, by = %principal.username(), "Entry authors replaced");
    Ok(Json(EntryResponse::new(entry, state.weblog_prefix())))
}

/// PUT /api/v1/entries/{id}/status
async fn set_status(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<EntryResponse>, ApiError> {
    let entry = load_entry(&state, id).await?;
    let principal = Principal::User(user);
    if !state.permissions.can_change_status(&principal, &entry) {
        return Err(ApiError::forbidden("You may not change the status of this entry"));
    }

    let entry = state.entry_service.set_status(id, body.status).await?;
    info!(entry_id = id, status = %entry.status, by = %principal.username(), "Entry status changed");
    Ok(Json(EntryResponse::new(entry, state.weblog_prefix())))
}
