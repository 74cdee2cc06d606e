//! API layer - HTTP handlers and routing
//!
//! JSON endpoints under `/api/v1`:
//! - Auth (register, login, logout, current user)
//! - Entries (listing, author and status changes)
//! - Categories
//! - Admin account management
//!
//! `build_router` also mounts the HTML weblog views and resolves the
//! request principal once for every route.

pub mod admin;
pub mod auth;
pub mod categories;
pub mod entries;
pub mod middleware;

use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

use crate::views;

pub use middleware::{ApiError, AppState, AuthenticatedUser, CurrentPrincipal};

/// Build the `/api/v1` router
pub fn build_api_router() -> Router<AppState> {
    // Superuser routes
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_superuser));

    // Session required
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route_layer(axum_middleware::from_fn(middleware::require_auth));

    // Public routes; mutating entry and category handlers check the session themselves
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/entries", entries::router())
        .nest("/categories", categories::router())
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", build_api_router())
        .merge(views::router(state.clone()))
        // Outermost: every handler sees the resolved principal
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::resolve_principal,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Router-level test helpers over an in-memory database

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
        response::Response,
    };
    use tower::ServiceExt;

    use super::{build_router, AppState};
    use crate::config::Config;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateEntryInput, CreateUserInput, Entry, EntryStatus, User, DEFAULT_SITE_ID};
    use crate::permissions::{DefaultPermissionHandler, DynPermissionHandler};
    use crate::services::LoginInput;
    use crate::templates::TemplateEngine;
    use std::sync::Arc;

    pub const PASSWORD: &str = "password123";

    /// Fresh state with the default policy and the seeded site 1
    pub async fn test_state() -> AppState {
        test_state_with(Arc::new(DefaultPermissionHandler::new())).await
    }

    pub async fn test_state_with(permissions: DynPermissionHandler) -> AppState {
        state_from(Config::default(), permissions).await
    }

    /// Default policy, serving `site_id` instead of site 1
    pub async fn test_state_for_site(site_id: i64) -> AppState {
        let mut config = Config::default();
        config.weblog.site_id = site_id;
        state_from(config, Arc::new(DefaultPermissionHandler::new())).await
    }

    async fn state_from(config: Config, permissions: DynPermissionHandler) -> AppState {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let templates = TemplateEngine::new().expect("Failed to load templates");
        AppState::new(pool, config, permissions, templates)
    }

    pub async fn create_user(state: &AppState, username: &str, perms: &[&str], superuser: bool) -> User {
        state
            .user_service
            .create_user(CreateUserInput {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password: PASSWORD.to_string(),
                is_superuser: superuser,
                is_staff: false,
                permissions: perms.iter().map(|p| p.to_string()).collect(),
            })
            .await
            .expect("Failed to create user")
    }

    /// Session token for `username`
    pub async fn login(state: &AppState, username: &str) -> String {
        state
            .user_service
            .login(LoginInput::new(username, PASSWORD))
            .await
            .expect("Failed to log in")
            .id
    }

    fn entry_input(title: &str, status: EntryStatus, author_id: i64) -> CreateEntryInput {
        CreateEntryInput {
            title: title.to_string(),
            slug: String::new(),
            lead: String::new(),
            excerpt: String::new(),
            content: format!("Body of {}", title),
            status,
            comment_enabled: false,
            sites: vec![DEFAULT_SITE_ID],
            author_ids: vec![author_id],
        }
    }

    pub async fn create_entry(state: &AppState, title: &str, status: EntryStatus, author_id: i64) -> Entry {
        state
            .entry_service
            .create(entry_input(title, status, author_id))
            .await
            .expect("Failed to create entry")
    }

    /// Published entry with comments enabled
    pub async fn create_entry_with_comments(state: &AppState, title: &str, author_id: i64) -> Entry {
        let mut input = entry_input(title, EntryStatus::Published, author_id);
        input.comment_enabled = true;
        state
            .entry_service
            .create(input)
            .await
            .expect("Failed to create entry")
    }

    fn with_session(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
        match token {
            Some(token) => builder.header(header::COOKIE, format!("session={}", token)),
            None => builder,
        }
    }

    pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        with_session(Request::builder().method(method).uri(uri), token)
            .body(Body::empty())
            .unwrap()
    }

    pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
        with_session(Request::builder().method(method).uri(uri), token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn form_request(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        with_session(Request::builder().method("POST").uri(uri), token)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn send(state: &AppState, request: Request<Body>) -> Response {
        build_router(state.clone()).oneshot(request).await.unwrap()
    }

    pub async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use crate::models::{EntryQuery, EntryStatus};
    use crate::permissions::{codenames, StaffPermissionHandler};
    use axum::http::StatusCode;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let state = test_state().await;
        let response = send(&state, empty_request("GET", "/nowhere", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_session_is_anonymous() {
        let state = test_state().await;
        let response = send(&state, empty_request("GET", "/api/v1/auth/me", Some("bogus-token"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&state, empty_request("GET", "/weblog/", Some("bogus-token"))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_configured_handler_drives_views() {
        let state = test_state_with(Arc::new(StaffPermissionHandler::new())).await;
        let staff = state
            .user_service
            .create_user(crate::models::CreateUserInput {
                username: "staffer".to_string(),
                email: "staffer@example.com".to_string(),
                password: PASSWORD.to_string(),
                is_staff: true,
                ..Default::default()
            })
            .await
            .unwrap();
        create_user(&state, "permitted", &[codenames::ADD_ENTRY], false).await;

        // Staff gate ignores codenames
        let token = login(&state, "permitted").await;
        let response = send(&state, empty_request("GET", "/weblog/entry/new/", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let token = login(&state, "staffer").await;
        let response = send(
            &state,
            form_request("/weblog/entry/new/", Some(&token), "title=Staff+note&status=draft&sites=1&save=Save"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let entries = state
            .entry_service
            .list(&EntryQuery::all().filter_status(EntryStatus::Draft))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].has_author(staff.id));
    }
}
