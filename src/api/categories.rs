//! Category API endpoints
//!
//! - GET /api/v1/categories - List categories
//! - POST /api/v1/categories - Create a category
//! - PUT /api/v1/categories/{id} - Update a category
//! - DELETE /api/v1/categories/{id} - Delete a category

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Category, CreateCategoryInput, Principal, UpdateCategoryInput};

/// Response for category list
#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<Category>,
}

/// Build the categories router; mutating handlers authenticate via `AuthenticatedUser`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/{id}", put(update_category).delete(delete_category))
}

/// GET /api/v1/categories
async fn list_categories(State(state): State<AppState>) -> Result<Json<CategoryListResponse>, ApiError> {
    let categories = state.category_service.list().await?;
    Ok(Json(CategoryListResponse { categories }))
}

async fn load_category(state: &AppState, id: i64) -> Result<Category, ApiError> {
    state
        .category_service
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Category {} not found", id)))
}

/// POST /api/v1/categories
async fn create_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let principal = Principal::User(user);
    if !state.permissions.can_add_category(&principal) {
        return Err(ApiError::forbidden("You may not add categories"));
    }

    let category = state.category_service.create(body).await?;
    info!(category_id = category.id, by = %principal.username(), "Category created via API");
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/v1/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    let category = load_category(&state, id).await?;
    let principal = Principal::User(user);
    if !state.permissions.can_change_category(&principal, &category) {
        return Err(ApiError::forbidden("You may not change this category"));
    }

    let category = state.category_service.update(id, body).await?;
    Ok(Json(category))
}

/// DELETE /api/v1/categories/{id}
async fn delete_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let category = load_category(&state, id).await?;
    let principal = Principal::User(user);
    if !state.permissions.can_delete_category(&principal, &category) {
        return Err(ApiError::forbidden("You may not delete this category"));
    }

    state.category_service.delete(id).await?;
    info!(category_id = id, by = %principal.username(), "Category deleted via API");
    Ok(StatusCode::NO_CONTENT)
}
