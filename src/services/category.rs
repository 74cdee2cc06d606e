//! Category service
//!
//! Implements business logic for category management:
//! - Create, read, update, delete categories
//! - Slug generation from the title and slug uniqueness
//! - Parent validation and cycle prevention
//!
//! Callers check `can_add_category`, `can_change_category` and
//! `can_delete_category` on the permission handler first.

use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CreateCategoryInput, UpdateCategoryInput};
use crate::services::slug::slugify;
use anyhow::Context;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    /// Category slug already exists
    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    /// Category not found
    #[error("Category not found: {0}")]
    NotFound(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Parent category not found
    #[error("Parent category not found: {0}")]
    ParentNotFound(i64),

    /// Circular reference detected
    #[error("Circular reference detected: category cannot be its own ancestor")]
    CircularReference,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Category service for managing weblog categories
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    /// Create a new category service
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    /// Create a new category
    ///
    /// # Errors
    /// - `ValidationError` if the title is blank or yields an empty slug
    /// - `DuplicateSlug` if a category with the same slug already exists
    /// - `ParentNotFound` if the specified parent category doesn't exist
    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(CategoryServiceError::ValidationError(
                "Category title cannot be empty".to_string(),
            ));
        }

        let slug = derive_slug(&input.slug, title)?;
        if self
            .repo
            .exists_by_slug(&slug, None)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(CategoryServiceError::DuplicateSlug(slug));
        }

        if let Some(parent_id) = input.parent_id {
            self.ensure_parent(parent_id).await?;
        }

        let category = Category {
            id: 0,
            title: title.to_string(),
            slug,
            description: input.description,
            parent_id: input.parent_id,
            created_at: Utc::now(),
        };
        let created = self.repo.create(&category).await.context("Failed to create category")?;

        info!(category_id = created.id, slug = %created.slug, "Category created");
        Ok(created)
    }

    /// Get category by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Category>, CategoryServiceError> {
        Ok(self.repo.get_by_id(id).await.context("Failed to get category by ID")?)
    }

    /// Get category by slug
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, CategoryServiceError> {
        Ok(self.repo.get_by_slug(slug).await.context("Failed to get category by slug")?)
    }

    /// List all categories ordered by title
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self.repo.list().await.context("Failed to list categories")?)
    }

    /// Update a category
    ///
    /// # Errors
    /// - `NotFound` if the category doesn't exist
    /// - `DuplicateSlug` if the new slug already exists
    /// - `ParentNotFound` / `CircularReference` for an invalid new parent
    pub async fn update(&self, id: i64, input: UpdateCategoryInput) -> Result<Category, CategoryServiceError> {
        let mut category = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or(CategoryServiceError::NotFound(id))?;

        if let Some(title) = input.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(CategoryServiceError::ValidationError(
                    "Category title cannot be empty".to_string(),
                ));
            }
            category.title = title.to_string();
        }

        if let Some(new_slug) = input.slug {
            let slug = derive_slug(&new_slug, &category.title)?;
            if slug != category.slug {
                if self
                    .repo
                    .exists_by_slug(&slug, Some(id))
                    .await
                    .context("Failed to check slug uniqueness")?
                {
                    return Err(CategoryServiceError::DuplicateSlug(slug));
                }
                category.slug = slug;
            }
        }

        if let Some(description) = input.description {
            category.description = description;
        }

        if let Some(new_parent_id) = input.parent_id {
            if let Some(parent_id) = new_parent_id {
                self.ensure_parent(parent_id).await?;
                if self.would_create_cycle(id, parent_id).await? {
                    return Err(CategoryServiceError::CircularReference);
                }
            }
            category.parent_id = new_parent_id;
        }

        let updated = self.repo.update(&category).await.context("Failed to update category")?;
        info!(category_id = id, "Category updated");
        Ok(updated)
    }

    /// Delete a category. Its children become root categories.
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        if self.get_by_id(id).await?.is_none() {
            return Err(CategoryServiceError::NotFound(id));
        }
        self.repo.delete(id).await.context("Failed to delete category")?;
        info!(category_id = id, "Category deleted");
        Ok(())
    }

    async fn ensure_parent(&self, parent_id: i64) -> Result<(), CategoryServiceError> {
        if self
            .repo
            .get_by_id(parent_id)
            .await
            .context("Failed to get parent category")?
            .is_none()
        {
            return Err(CategoryServiceError::ParentNotFound(parent_id));
        }
        Ok(())
    }

    /// Check if making `new_parent_id` the parent of `category_id` closes a loop
    async fn would_create_cycle(&self, category_id: i64, new_parent_id: i64) -> Result<bool, CategoryServiceError> {
        let parents: HashMap<i64, Option<i64>> = self
            .list()
            .await?
            .into_iter()
            .map(|c| (c.id, c.parent_id))
            .collect();

        let mut current = Some(new_parent_id);
        let mut steps = 0;
        while let Some(id) = current {
            if id == category_id {
                return Ok(true);
            }
            steps += 1;
            if steps > parents.len() {
                // Existing data already loops
                return Ok(true);
            }
            current = parents.get(&id).copied().flatten();
        }
        Ok(false)
    }
}

fn derive_slug(requested: &str, title: &str) -> Result<String, CategoryServiceError> {
    let source = if requested.trim().is_empty() { title } else { requested };
    let slug = slugify(source);
    if slug.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Category slug cannot be empty".to_string(),
        ));
    }
    Ok(slug)
}
