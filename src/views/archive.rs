//! Public reading views: archive index, entry detail and comment posting

use axum::{
    extract::{Path, State},
    response::{Html, Redirect},
};
use axum_extra::extract::Form;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{base_context, render, site_entries, visible_entry, Urls, ViewError};
use crate::api::middleware::{AppState, CurrentPrincipal};
use crate::models::{CreateCommentInput, EntryStatus};

/// Archive row
#[derive(Debug, Serialize)]
struct EntrySummary {
    url: String,
    title: String,
    publication_date: String,
    status: EntryStatus,
    excerpt: String,
}

/// Comment form submission
#[derive(Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub content: String,
}

/// GET {prefix}/
pub async fn entry_index(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Html<String>, ViewError> {
    let urls = Urls::new(state.weblog_prefix());
    let query = site_entries(&state, &principal);
    let entries: Vec<EntrySummary> = state
        .entry_service
        .list(&query)
        .await?
        .into_iter()
        .map(|entry| EntrySummary {
            url: urls.entry_detail(&entry),
            publication_date: entry.publication_date.to_rfc3339(),
            title: entry.title,
            status: entry.status,
            excerpt: entry.excerpt,
        })
        .collect();

    let mut context = base_context(&state, &principal).await;
    context.insert("entries", &entries);
    context.insert("can_create", &state.permissions.can_create_entry(&principal));
    context.insert("create_url", &urls.entry_create());
    render(&state, "entry_archive.html", &context)
}

/// GET {prefix}/{year}/{month}/{day}/{slug}/
pub async fn entry_detail(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((year, month, day, slug)): Path<(i32, u32, u32, String)>,
) -> Result<Html<String>, ViewError> {
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(ViewError::NotFound)?;
    let query = site_entries(&state, &principal);
    let entry = state
        .entry_service
        .find_by_date_and_slug(&query, date, &slug)
        .await?
        .ok_or(ViewError::NotFound)?;
    let comments = state.comment_service.list_for_entry(entry.id).await?;
    let urls = Urls::new(state.weblog_prefix());

    let mut context = base_context(&state, &principal).await;
    context.insert("content_html", &entry.html_content(state.config.weblog.markup_language));
    context.insert("can_edit", &state.permissions.can_change_entry(&principal, &entry));
    context.insert("edit_url", &urls.entry_update(entry.id));
    context.insert("can_comment", &state.permissions.can_comment_entry(&principal, &entry));
    context.insert("comment_action", &urls.entry_comment(entry.id));
    context.insert("comments", &comments);
    context.insert("entry", &entry);
    render(&state, "entry_detail.html", &context)
}

/// POST {prefix}/entry/{id}/comment/
pub async fn post_comment(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect, ViewError> {
    let entry = visible_entry(&state, &principal, id).await?;
    if !state.permissions.can_comment_entry(&principal, &entry) {
        return Err(ViewError::Forbidden("Comments are closed for this entry.".to_string()));
    }
    let user_id = principal
        .id()
        .ok_or_else(|| ViewError::Forbidden("Log in to comment.".to_string()))?;

    let entry_url = Urls::new(state.weblog_prefix()).entry_detail(&entry);
    if form.content.trim().is_empty() {
        debug!(entry_id = id, "Ignoring empty comment");
        return Ok(Redirect::to(&entry_url));
    }

    let comment = state
        .comment_service
        .create(CreateCommentInput {
            entry_id: entry.id,
            user_id,
            content: form.content,
        })
        .await?;
    info!(comment_id = comment.id, entry_id = id, "Comment posted");
    Ok(Redirect::to(&format!("{}#comments", entry_url)))
}
