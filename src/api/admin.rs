//! Admin API endpoints (superuser only)
//!
//! - POST /api/v1/admin/users - Create an account
//! - PUT /api/v1/admin/users/{id}/permissions - Replace permission codenames

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::api::auth::UserResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::CreateUserInput;

/// Request body for creating a user
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Request body for replacing permissions
#[derive(Debug, Deserialize)]
pub struct SetPermissionsRequest {
    pub permissions: Vec<String>,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/{id}/permissions", put(set_permissions))
}

/// POST /api/v1/admin/users
async fn create_user(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state
        .user_service
        .create_user(CreateUserInput {
            username: body.username,
            email: body.email,
            password: body.password,
            is_superuser: body.is_superuser,
            is_staff: body.is_staff,
            permissions: body.permissions,
        })
        .await?;
    info!(user_id = user.id, by = %admin.username, "Account created by admin");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// PUT /api/v1/admin/users/{id}/permissions
async fn set_permissions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<SetPermissionsRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.user_service.set_permissions(id, &body.permissions).await?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::*;
    use crate::permissions::codenames;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_admin_routes_require_superuser() {
        let state = test_state().await;
        create_user(&state, "plain", &[codenames::ADD_ENTRY], false).await;
        let plain = login(&state, "plain").await;
        let body = json!({"username": "new", "email": "new@example.com", "password": "password123"});

        let response = send(&state, json_request("POST", "/api/v1/admin/users", None, body.clone())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&state, json_request("POST", "/api/v1/admin/users", Some(&plain), body)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_create_user_and_set_permissions() {
        let state = test_state().await;
        create_user(&state, "root", &[], true).await;
        let root = login(&state, "root").await;

        let response = send(&state, json_request("POST", "/api/v1/admin/users", Some(&root), json!({
            "username": "writer",
            "email": "writer@example.com",
            "password": "password123",
            "permissions": [codenames::ADD_ENTRY]
        })))
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_i64().unwrap();

        let uri = format!("/api/v1/admin/users/{}/permissions", id);
        let response = send(&state, json_request("PUT", &uri, Some(&root), json!({
            "permissions": [codenames::CHANGE_ENTRY, codenames::CHANGE_STATUS]
        })))
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["permissions"], json!([codenames::CHANGE_ENTRY, codenames::CHANGE_STATUS]));

        let response = send(&state, json_request("PUT", &uri, Some(&root), json!({"permissions": ["zinnia.can_fly"]}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
