//! Category repository
//!
//! This module provides:
//! - `CategoryRepository` trait defining the interface for category data access
//! - `SqlxCategoryRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Insert a category; `id` and `created_at` of the argument are ignored
    async fn create(&self, category: &Category) -> Result<Category>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Get category by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// List all categories ordered by title
    async fn list(&self) -> Result<Vec<Category>>;

    /// Persist title, slug, description and parent
    async fn update(&self, category: &Category) -> Result<Category>;

    /// Delete a category; children are detached first
    async fn delete(&self, id: i64) -> Result<()>;

    /// Check if a slug is taken by another category
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_category_sqlite(self.pool.sqlite()?, category).await,
            DatabaseDriver::Mysql => create_category_mysql(self.pool.mysql()?, category).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_category_sqlite(self.pool.sqlite()?, "id", CategoryKey::Id(id)).await,
            DatabaseDriver::Mysql => get_category_mysql(self.pool.mysql()?, "id", CategoryKey::Id(id)).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_category_sqlite(self.pool.sqlite()?, "slug", CategoryKey::Slug(slug)).await
            }
            DatabaseDriver::Mysql => {
                get_category_mysql(self.pool.mysql()?, "slug", CategoryKey::Slug(slug)).await
            }
        }
    }

    async fn list(&self) -> Result<Vec<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_categories_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_categories_mysql(self.pool.mysql()?).await,
        }
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_category_sqlite(self.pool.sqlite()?, category).await?,
            DatabaseDriver::Mysql => update_category_mysql(self.pool.mysql()?, category).await?,
        }
        self.get_by_id(category.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Category not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_category_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_category_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let exclude_id = exclude_id.unwrap_or(0);
        let sql = "SELECT COUNT(*) as count FROM categories WHERE slug = ? AND id <> ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(slug)
                .bind(exclude_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check category slug existence")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(slug)
                .bind(exclude_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check category slug existence")?
                .get("count"),
        };
        Ok(count > 0)
    }
}

enum CategoryKey<'a> {
    Id(i64),
    Slug(&'a str),
}

const CATEGORY_COLUMNS: &str = "id, title, slug, description, parent_id, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_category_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO categories (title, slug, description, parent_id, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&category.title)
    .bind(&category.slug)
    .bind(&category.description)
    .bind(category.parent_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_rowid(),
        created_at: now,
        ..category.clone()
    })
}

async fn get_category_sqlite(
    pool: &SqlitePool,
    column: &str,
    key: CategoryKey<'_>,
) -> Result<Option<Category>> {
    let sql = format!("SELECT {} FROM categories WHERE {} = ?", CATEGORY_COLUMNS, column);
    let query = sqlx::query(&sql);
    let query = match key {
        CategoryKey::Id(id) => query.bind(id),
        CategoryKey::Slug(slug) => query.bind(slug),
    };
    let row = query
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get category by {}", column))?;

    Ok(row.map(|row| row_to_category_sqlite(&row)))
}

async fn list_categories_sqlite(pool: &SqlitePool) -> Result<Vec<Category>> {
    let sql = format!("SELECT {} FROM categories ORDER BY title, id", CATEGORY_COLUMNS);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;

    Ok(rows.iter().map(row_to_category_sqlite).collect())
}

async fn update_category_sqlite(pool: &SqlitePool, category: &Category) -> Result<()> {
    sqlx::query("UPDATE categories SET title = ?, slug = ?, description = ?, parent_id = ? WHERE id = ?")
        .bind(&category.title)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.parent_id)
        .bind(category.id)
        .execute(pool)
        .await
        .context("Failed to update category")?;
    Ok(())
}

async fn delete_category_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE categories SET parent_id = NULL WHERE parent_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to detach child categories")?;

    sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete category")?;

    tx.commit().await?;
    Ok(())
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
        parent_id: row.get("parent_id"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_category_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO categories (title, slug, description, parent_id, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&category.title)
    .bind(&category.slug)
    .bind(&category.description)
    .bind(category.parent_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..category.clone()
    })
}

async fn get_category_mysql(
    pool: &MySqlPool,
    column: &str,
    key: CategoryKey<'_>,
) -> Result<Option<Category>> {
    let sql = format!("SELECT {} FROM categories WHERE {} = ?", CATEGORY_COLUMNS, column);
    let query = sqlx::query(&sql);
    let query = match key {
        CategoryKey::Id(id) => query.bind(id),
        CategoryKey::Slug(slug) => query.bind(slug),
    };
    let row = query
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get category by {}", column))?;

    Ok(row.map(|row| row_to_category_mysql(&row)))
}

async fn list_categories_mysql(pool: &MySqlPool) -> Result<Vec<Category>> {
    let sql = format!("SELECT {} FROM categories ORDER BY title, id", CATEGORY_COLUMNS);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;

    Ok(rows.iter().map(row_to_category_mysql).collect())
}

async fn update_category_mysql(pool: &MySqlPool, category: &Category) -> Result<()> {
    sqlx::query("UPDATE categories SET title = ?, slug = ?, description = ?, parent_id = ? WHERE id = ?")
        .bind(&category.title)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.parent_id)
        .bind(category.id)
        .execute(pool)
        .await
        .context("Failed to update category")?;
    Ok(())
}

async fn delete_category_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE categories SET parent_id = NULL WHERE parent_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to detach child categories")?;

    sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete category")?;

    tx.commit().await?;
    Ok(())
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Category {
    Category {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
        parent_id: row.get("parent_id"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxCategoryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCategoryRepository::new(pool)
    }

    fn category(title: &str, slug: &str, parent_id: Option<i64>) -> Category {
        Category {
            id: 0,
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("About {}", title),
            parent_id,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup_test_repo().await;
        let created = repo.create(&category("News", "news", None)).await.unwrap();
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().expect("Category not found");
        assert_eq!(by_id.title, "News");
        assert_eq!(by_id.description, "About News");

        let by_slug = repo.get_by_slug("news").await.unwrap().expect("Category not found");
        assert_eq!(by_slug.id, created.id);

        assert!(repo.get_by_id(9999).await.unwrap().is_none());
        assert!(repo.get_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_ordered_by_title() {
        let repo = setup_test_repo().await;
        repo.create(&category("Zebra", "zebra", None)).await.unwrap();
        repo.create(&category("Apple", "apple", None)).await.unwrap();

        let titles: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["Apple", "Zebra"]);
    }

    #[tokio::test]
    async fn test_update() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&category("Old", "old", None)).await.unwrap();
        created.title = "New".to_string();
        created.slug = "new".to_string();

        let updated = repo.update(&created).await.unwrap();
        assert_eq!(updated.title, "New");
        assert!(repo.get_by_slug("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_detaches_children() {
        let repo = setup_test_repo().await;
        let parent = repo.create(&category("Parent", "parent", None)).await.unwrap();
        let child = repo.create(&category("Child", "child", Some(parent.id))).await.unwrap();

        repo.delete(parent.id).await.unwrap();

        assert!(repo.get_by_id(parent.id).await.unwrap().is_none());
        let child = repo.get_by_id(child.id).await.unwrap().expect("Child removed");
        assert_eq!(child.parent_id, None);
    }

    #[tokio::test]
    async fn test_exists_by_slug_excludes_self() {
        let repo = setup_test_repo().await;
        let created = repo.create(&category("News", "news", None)).await.unwrap();

        assert!(repo.exists_by_slug("news", None).await.unwrap());
        assert!(!repo.exists_by_slug("news", Some(created.id)).await.unwrap());
        assert!(!repo.exists_by_slug("other", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_slug_constraint() {
        let repo = setup_test_repo().await;
        repo.create(&category("One", "dup", None)).await.unwrap();
        assert!(repo.create(&category("Two", "dup", None)).await.is_err());
    }
}
