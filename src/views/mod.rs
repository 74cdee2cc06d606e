//! HTML views of the weblog
//!
//! Mounted under the configured URL prefix (default `/weblog`):
//! - `/` - archive of visible entries
//! - `/entry/new/` - create form
//! - `/entry/{id}/update/` - edit form
//! - `/entry/{id}/` - redirect to the canonical entry URL
//! - `/entry/{id}/comment/` - post a comment
//! - `/{year}/{month}/{day}/{slug}/` - entry detail
//!
//! Handlers return `ViewError` for 403/404/500. The error carries an
//! `ErrorPage` extension that `render_error_pages` turns into `error.html`.

pub mod archive;
pub mod entry;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self as axum_middleware, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Extension, Router,
};
use tera::Context as TeraContext;
use tracing::{error, warn};

use crate::api::middleware::AppState;
use crate::models::{Entry, EntryQuery, Principal};
use crate::services::{CommentServiceError, EntryServiceError};
use crate::templates::TemplateError;

/// Errors surfaced by HTML views
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("Page not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ViewError {
    pub fn forbidden() -> Self {
        Self::Forbidden("You do not have permission to access this page.".to_string())
    }

    fn page(&self) -> ErrorPage {
        match self {
            ViewError::NotFound => ErrorPage::new(
                StatusCode::NOT_FOUND,
                "Not Found",
                "The requested page does not exist.",
            ),
            ViewError::Forbidden(msg) => ErrorPage::new(StatusCode::FORBIDDEN, "Forbidden", msg),
            ViewError::BadRequest(msg) => ErrorPage::new(StatusCode::BAD_REQUEST, "Bad Request", msg),
            ViewError::Internal(_) => ErrorPage::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server Error",
                "Something went wrong while handling the request.",
            ),
        }
    }
}

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        if let ViewError::Internal(cause) = &self {
            error!("View failed: {}", cause);
        }
        let page = self.page();
        (page.status, Extension(page.clone()), page.message).into_response()
    }
}

impl From<EntryServiceError> for ViewError {
    fn from(e: EntryServiceError) -> Self {
        match e {
            EntryServiceError::NotFound(_) => ViewError::NotFound,
            EntryServiceError::ValidationError(msg) => ViewError::BadRequest(msg),
            EntryServiceError::UnknownSite(_) | EntryServiceError::UnknownUser(_) => {
                ViewError::BadRequest(e.to_string())
            }
            EntryServiceError::InternalError(e) => ViewError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<CommentServiceError> for ViewError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::ValidationError(msg) => ViewError::BadRequest(msg),
            CommentServiceError::InternalError(e) => ViewError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<TemplateError> for ViewError {
    fn from(e: TemplateError) -> Self {
        ViewError::Internal(e.to_string())
    }
}

impl From<anyhow::Error> for ViewError {
    fn from(e: anyhow::Error) -> Self {
        ViewError::Internal(format!("{:#}", e))
    }
}

/// Marker left on error responses for `render_error_pages`
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub title: String,
    pub message: String,
}

impl ErrorPage {
    fn new(status: StatusCode, title: &str, message: &str) -> Self {
        Self {
            status,
            title: title.to_string(),
            message: message.to_string(),
        }
    }
}

/// Replace marked error responses with the rendered `error.html`
pub async fn render_error_pages(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let principal = request.extensions().get::<Principal>().cloned().unwrap_or_default();
    let response = next.run(request).await;

    let Some(page) = response.extensions().get::<ErrorPage>().cloned() else {
        return response;
    };

    let mut context = base_context(&state, &principal).await;
    context.insert("status", &page.status.as_u16());
    context.insert("title", &page.title);
    context.insert("message", &page.message);
    let html = state.templates.render_or_fallback("error.html", &context);
    (page.status, Html(html)).into_response()
}

/// Context shared by every page: site name, weblog URL and current user
pub async fn base_context(state: &AppState, principal: &Principal) -> TeraContext {
    let site_name = match state.site_repo.get_by_id(state.site_id()).await {
        Ok(Some(site)) => site.name,
        Ok(None) => "Zinnia".to_string(),
        Err(e) => {
            warn!("Failed to load current site: {:#}", e);
            "Zinnia".to_string()
        }
    };

    let mut context = TeraContext::new();
    context.insert("site_name", &site_name);
    context.insert("weblog_url", state.weblog_prefix());
    context.insert("current_user", &principal.user().map(|u| u.username.as_str()));
    context
}

/// Render a template into an HTML response
pub fn render(state: &AppState, template: &str, context: &TeraContext) -> Result<Html<String>, ViewError> {
    Ok(Html(state.templates.render(template, context)?))
}

/// Entries of this site the principal may read
pub fn site_entries(state: &AppState, principal: &Principal) -> EntryQuery {
    state
        .permissions
        .filter_entries(principal, EntryQuery::all().on_site(state.site_id()))
}

/// Load an entry of this site the principal is allowed to see
pub async fn visible_entry(state: &AppState, principal: &Principal, id: i64) -> Result<Entry, ViewError> {
    let entry = state.entry_service.get_by_id(id).await?.ok_or(ViewError::NotFound)?;
    if !site_entries(state, principal).matches(&entry) {
        return Err(ViewError::NotFound);
    }
    Ok(entry)
}

/// URL helpers relative to the weblog prefix
pub struct Urls<'a> {
    prefix: &'a str,
}

impl<'a> Urls<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    pub fn index(&self) -> String {
        format!("{}/", self.prefix)
    }

    pub fn entry_create(&self) -> String {
        format!("{}/entry/new/", self.prefix)
    }

    pub fn entry_update(&self, id: i64) -> String {
        format!("{}/entry/{}/update/", self.prefix, id)
    }

    pub fn entry_comment(&self, id: i64) -> String {
        format!("{}/entry/{}/comment/", self.prefix, id)
    }

    pub fn entry_detail(&self, entry: &Entry) -> String {
        entry.absolute_url_with_prefix(self.prefix)
    }
}

/// Build the weblog router with every path under `prefix`
pub fn router(state: AppState) -> Router<AppState> {
    let urls = Urls::new(state.weblog_prefix());
    let path = |suffix: &str| format!("{}{}", state.weblog_prefix(), suffix);

    Router::new()
        .route(&urls.index(), get(archive::entry_index))
        .route(&path("/entry/new/"), get(entry::create_form).post(entry::create_entry))
        .route(&path("/entry/{id}/"), get(entry::entry_redirect))
        .route(&path("/entry/{id}/update/"), get(entry::update_form).post(entry::update_entry))
        .route(&path("/entry/{id}/comment/"), post(archive::post_comment))
        .route(&path("/{year}/{month}/{day}/{slug}/"), get(archive::entry_detail))
        .layer(axum_middleware::from_fn_with_state(state.clone(), render_error_pages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let urls = Urls::new("/weblog");
        assert_eq!(urls.index(), "/weblog/");
        assert_eq!(urls.entry_create(), "/weblog/entry/new/");
        assert_eq!(urls.entry_update(4), "/weblog/entry/4/update/");
        assert_eq!(urls.entry_comment(4), "/weblog/entry/4/comment/");

        assert_eq!(Urls::new("").index(), "/");
    }

    #[test]
    fn test_view_error_status() {
        assert_eq!(ViewError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(ViewError::forbidden().into_response().status(), StatusCode::FORBIDDEN);
        let response = ViewError::Internal("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<ErrorPage>().is_some());
    }
}
