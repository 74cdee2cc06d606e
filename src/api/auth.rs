//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Bootstrap account (only while no user exists)
//! - POST /api/v1/auth/login - Open a session
//! - POST /api/v1/auth/logout - Close the session
//! - GET /api/v1/auth/me - Current user

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser, SESSION_COOKIE};
use crate::models::{Session, User};
use crate::services::{LoginInput, RegisterInput};

/// Request body for registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

/// User as exposed by the API
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub permissions: Vec<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_superuser: user.is_superuser,
            is_staff: user.is_staff,
            permissions: user.permissions.into_iter().collect(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Routes reachable without a session
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

fn session_cookie(session: &Session) -> Result<HeaderValue, ApiError> {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, session.id, max_age
    );
    HeaderValue::from_str(&cookie).map_err(|e| ApiError::internal_error(e.to_string()))
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let password = body.password.clone();
    let user = state
        .user_service
        .register(RegisterInput::new(body.username, body.email, body.password))
        .await?;
    let session = state
        .user_service
        .login(LoginInput::new(user.username.clone(), password))
        .await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session_cookie(&session)?);

    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .user_service
        .login(LoginInput::new(body.username, body.password))
        .await?;
    let user = state
        .user_service
        .get_by_id(session.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session_cookie(&session)?);

    Ok((
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/logout
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// GET /api/v1/auth/me
async fn get_current_user(AuthenticatedUser(user): AuthenticatedUser) -> Json<UserResponse> {
    Json(user.into())
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::*;
    use axum::http::{header, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_register_first_user_then_closed() {
        let state = test_state().await;

        let response = send(&state, json_request("POST", "/api/v1/auth/register", None, json!({
            "username": "admin",
            "email": "admin@example.com",
            "password": "password123"
        })))
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
        assert!(cookie.starts_with("session="));
        let body = body_json(response).await;
        assert_eq!(body["user"]["is_superuser"], true);

        let response = send(&state, json_request("POST", "/api/v1/auth/register", None, json!({
            "username": "second",
            "email": "second@example.com",
            "password": "password123"
        })))
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_login_me_logout() {
        let state = test_state().await;
        create_user(&state, "writer", &[], false).await;

        let response = send(&state, json_request("POST", "/api/v1/auth/login", None, json!({
            "username": "writer",
            "password": "wrong-password"
        })))
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let token = login(&state, "writer").await;
        let response = send(&state, empty_request("GET", "/api/v1/auth/me", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["username"], "writer");

        let response = send(&state, empty_request("POST", "/api/v1/auth/logout", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&state, empty_request("GET", "/api/v1/auth/me", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
