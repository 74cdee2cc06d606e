//! User repository
//!
//! Accounts and their granted permission codenames. Codenames live in
//! `user_permissions` and are loaded alongside every user.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::BTreeSet;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a user together with its permissions
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Persist email, flags and password hash
    async fn update(&self, user: &User) -> Result<User>;

    /// Replace the permission codenames of a user
    async fn set_permissions(&self, user_id: i64, permissions: &BTreeSet<String>) -> Result<()>;

    /// Count all users
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, is_superuser, is_staff, is_active, created_at, updated_at";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let created = match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user).await?,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, user).await?,
        };
        self.set_permissions(created.id, &user.permissions).await?;
        Ok(User {
            permissions: user.permissions.clone(),
            ..created
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get user by ID")?;
                match row {
                    Some(row) => Ok(Some(with_permissions_sqlite(pool, row_to_user_sqlite(&row)).await?)),
                    None => Ok(None),
                }
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get user by ID")?;
                match row {
                    Some(row) => Ok(Some(with_permissions_mysql(pool, row_to_user_mysql(&row)).await?)),
                    None => Ok(None),
                }
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let row = sqlx::query(&sql)
                    .bind(username)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get user by username")?;
                match row {
                    Some(row) => Ok(Some(with_permissions_sqlite(pool, row_to_user_sqlite(&row)).await?)),
                    None => Ok(None),
                }
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let row = sqlx::query(&sql)
                    .bind(username)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get user by username")?;
                match row {
                    Some(row) => Ok(Some(with_permissions_mysql(pool, row_to_user_mysql(&row)).await?)),
                    None => Ok(None),
                }
            }
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        let sql = r#"
            UPDATE users
            SET email = ?, password_hash = ?, is_superuser = ?, is_staff = ?, is_active = ?, updated_at = ?
            WHERE id = ?
        "#;
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(user.is_superuser)
                    .bind(user.is_staff)
                    .bind(user.is_active)
                    .bind(now)
                    .bind(user.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update user")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(user.is_superuser)
                    .bind(user.is_staff)
                    .bind(user.is_active)
                    .bind(now)
                    .bind(user.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update user")?;
            }
        }
        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn set_permissions(&self, user_id: i64, permissions: &BTreeSet<String>) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self.pool.sqlite()?.begin().await?;
                sqlx::query("DELETE FROM user_permissions WHERE user_id = ?")
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to clear permissions")?;
                for codename in permissions {
                    sqlx::query("INSERT INTO user_permissions (user_id, codename) VALUES (?, ?)")
                        .bind(user_id)
                        .bind(codename)
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to grant permission {}", codename))?;
                }
                tx.commit().await?;
            }
            DatabaseDriver::Mysql => {
                let mut tx = self.pool.mysql()?.begin().await?;
                sqlx::query("DELETE FROM user_permissions WHERE user_id = ?")
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to clear permissions")?;
                for codename in permissions {
                    sqlx::query("INSERT INTO user_permissions (user_id, codename) VALUES (?, ?)")
                        .bind(user_id)
                        .bind(codename)
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to grant permission {}", codename))?;
                }
                tx.commit().await?;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM users";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count users")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count users")?
                .get("count"),
        };
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, is_superuser, is_staff, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.is_superuser)
    .bind(user.is_staff)
    .bind(user.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn with_permissions_sqlite(pool: &SqlitePool, mut user: User) -> Result<User> {
    let rows = sqlx::query("SELECT codename FROM user_permissions WHERE user_id = ?")
        .bind(user.id)
        .fetch_all(pool)
        .await
        .context("Failed to load user permissions")?;
    user.permissions = rows.iter().map(|row| row.get("codename")).collect();
    Ok(user)
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_superuser: row.get("is_superuser"),
        is_staff: row.get("is_staff"),
        is_active: row.get("is_active"),
        permissions: BTreeSet::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, is_superuser, is_staff, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.is_superuser)
    .bind(user.is_staff)
    .bind(user.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn with_permissions_mysql(pool: &MySqlPool, mut user: User) -> Result<User> {
    let rows = sqlx::query("SELECT codename FROM user_permissions WHERE user_id = ?")
        .bind(user.id)
        .fetch_all(pool)
        .await
        .context("Failed to load user permissions")?;
    user.permissions = rows.iter().map(|row| row.get("codename")).collect();
    Ok(user)
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_superuser: row.get("is_superuser"),
        is_staff: row.get("is_staff"),
        is_active: row.get("is_active"),
        permissions: BTreeSet::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
