//! API middleware
//!
//! Contains:
//! - `AppState`, the shared services and the process-wide permission handler
//! - `ApiError`, the JSON error body
//! - Session resolution into a `Principal` for every request
//! - Authentication and superuser gates

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::error;

use crate::config::Config;
use crate::db::repositories::{
    SiteRepository, SqlxCategoryRepository, SqlxCommentRepository, SqlxEntryRepository,
    SqlxSessionRepository, SqlxSiteRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{Principal, User};
use crate::permissions::DynPermissionHandler;
use crate::services::{
    CategoryService, CategoryServiceError, CommentService, CommentServiceError, EntryService,
    EntryServiceError, UserService, UserServiceError,
};
use crate::templates::TemplateEngine;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Resolved once at startup, read-only afterwards
    pub permissions: DynPermissionHandler,
    pub entry_service: Arc<EntryService>,
    pub category_service: Arc<CategoryService>,
    pub comment_service: Arc<CommentService>,
    pub user_service: Arc<UserService>,
    pub site_repo: Arc<dyn SiteRepository>,
    pub templates: Arc<TemplateEngine>,
}

impl AppState {
    /// Wire repositories and services over a migrated pool
    pub fn new(
        pool: DynDatabasePool,
        config: Config,
        permissions: DynPermissionHandler,
        templates: TemplateEngine,
    ) -> Self {
        let entry_repo = SqlxEntryRepository::boxed(pool.clone());
        let site_repo = SqlxSiteRepository::boxed(pool.clone());
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());

        Self {
            config: Arc::new(config),
            permissions,
            entry_service: Arc::new(EntryService::new(entry_repo, site_repo.clone(), user_repo.clone())),
            category_service: Arc::new(CategoryService::new(SqlxCategoryRepository::boxed(pool.clone()))),
            comment_service: Arc::new(CommentService::new(SqlxCommentRepository::boxed(pool))),
            user_service: Arc::new(UserService::new(user_repo, session_repo)),
            site_repo,
            templates: Arc::new(templates),
        }
    }

    /// The site this instance serves
    pub fn site_id(&self) -> i64 {
        self.config.weblog.site_id
    }

    /// Weblog URL prefix without a trailing slash
    pub fn weblog_prefix(&self) -> &str {
        self.config.weblog.prefix()
    }
}

/// The request principal, `Anonymous` when no valid session was presented
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Principal>().cloned().unwrap_or_default()))
    }
}

/// Authenticated user, present behind `require_auth`
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Principal>() {
            Some(Principal::User(user)) => Ok(Self(user.clone())),
            _ => Err(ApiError::unauthorized("Authentication required")),
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Logs the cause and hides it from the client
    pub fn internal_error(message: impl Into<String>) -> Self {
        let message = message.into();
        error!("Internal error: {}", message);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<EntryServiceError> for ApiError {
    fn from(e: EntryServiceError) -> Self {
        match e {
            EntryServiceError::NotFound(id) => ApiError::not_found(format!("Entry {} not found", id)),
            EntryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            EntryServiceError::UnknownSite(_) | EntryServiceError::UnknownUser(_) => {
                ApiError::validation_error(e.to_string())
            }
            EntryServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::NotFound(id) => ApiError::not_found(format!("Category {} not found", id)),
            CategoryServiceError::DuplicateSlug(_) => ApiError::conflict(e.to_string()),
            CategoryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CategoryServiceError::ParentNotFound(_) | CategoryServiceError::CircularReference => {
                ApiError::validation_error(e.to_string())
            }
            CategoryServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(_) => ApiError::conflict(e.to_string()),
            UserServiceError::NotFound(id) => ApiError::not_found(format!("User {} not found", id)),
            UserServiceError::RegistrationClosed => ApiError::forbidden(e.to_string()),
            UserServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CommentServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

/// Extract session token from the `Authorization: Bearer` header or the session cookie
pub fn extract_session_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    for cookie_header in headers.get_all(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some((name, value)) = cookie.trim().split_once('=') {
                    if name == SESSION_COOKIE && !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Resolve the session into a `Principal` extension for every request
pub async fn resolve_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut principal = Principal::Anonymous;
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => principal = Principal::User(user),
            Ok(None) => {}
            Err(e) => error!("Session validation failed: {}", e),
        }
    }
    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// Authentication middleware
pub async fn require_auth(request: Request, next: Next) -> Result<Response, ApiError> {
    let authenticated = request
        .extensions()
        .get::<Principal>()
        .is_some_and(Principal::is_authenticated);
    if !authenticated {
        return Err(ApiError::unauthorized("Authentication required"));
    }
    Ok(next.run(request).await)
}

/// Superuser authorization middleware
pub async fn require_superuser(request: Request, next: Next) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !principal.is_authenticated() {
        return Err(ApiError::unauthorized("Authentication required"));
    }
    if !principal.is_superuser() {
        return Err(ApiError::forbidden("Superuser privileges required"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn test_extract_token_from_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=tok-1; x=y"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok-1"));

        let mut other = HeaderMap::new();
        other.insert(header::COOKIE, HeaderValue::from_static("mysession=nope"));
        assert!(extract_session_token(&other).is_none());
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::new("WHATEVER", "x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let err = ApiError::internal_error("db exploded");
        assert_eq!(err.error.message, "Internal server error");
    }

    #[test]
    fn test_service_error_mapping() {
        let err: ApiError = EntryServiceError::NotFound(4).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let err: ApiError = CategoryServiceError::DuplicateSlug("news".into()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let err: ApiError = UserServiceError::RegistrationClosed.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
