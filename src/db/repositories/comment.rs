//! Comment repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CreateCommentInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Store a comment
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Comments of an entry, oldest first, with author usernames
    async fn list_by_entry(&self, entry_id: i64) -> Result<Vec<Comment>>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_BY_ENTRY: &str = r#"
    SELECT c.id, c.entry_id, c.user_id, u.username, c.content, c.created_at
    FROM comments c
    INNER JOIN users u ON u.id = c.user_id
    WHERE c.entry_id = ?
    ORDER BY c.created_at, c.id
"#;

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        let sql = "INSERT INTO comments (entry_id, user_id, content, created_at) VALUES (?, ?, ?, ?)";
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(input.entry_id)
                .bind(input.user_id)
                .bind(&input.content)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create comment")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(input.entry_id)
                .bind(input.user_id)
                .bind(&input.content)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create comment")?
                .last_insert_id() as i64,
        };

        Ok(Comment {
            id,
            entry_id: input.entry_id,
            user_id: input.user_id,
            username: String::new(),
            content: input.content.clone(),
            created_at: now,
        })
    }

    async fn list_by_entry(&self, entry_id: i64) -> Result<Vec<Comment>> {
        let comments: Vec<Comment> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(LIST_BY_ENTRY)
                .bind(entry_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list comments")?
                .iter()
                .map(|row| Comment {
                    id: row.get("id"),
                    entry_id: row.get("entry_id"),
                    user_id: row.get("user_id"),
                    username: row.get("username"),
                    content: row.get("content"),
                    created_at: row.get("created_at"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(LIST_BY_ENTRY)
                .bind(entry_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list comments")?
                .iter()
                .map(|row| Comment {
                    id: row.get("id"),
                    entry_id: row.get("entry_id"),
                    user_id: row.get("user_id"),
                    username: row.get("username"),
                    content: row.get("content"),
                    created_at: row.get("created_at"),
                })
                .collect(),
        };
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_create_and_list() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let sqlite = pool.sqlite().unwrap();

        let now = Utc::now();
        sqlx::query("INSERT INTO users (username, email, password_hash) VALUES ('reader', 'r@example.com', 'x')")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO entries (title, slug, publication_date, creation_date, last_update) VALUES ('t', 't', ?, ?, ?)",
        )
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(sqlite)
        .await
        .unwrap();

        let repo = SqlxCommentRepository::new(pool.clone());
        for text in ["first", "second"] {
            repo.create(&CreateCommentInput {
                entry_id: 1,
                user_id: 1,
                content: text.to_string(),
            })
            .await
            .unwrap();
        }

        let comments = repo.list_by_entry(1).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].content, "first");
        assert_eq!(comments[0].username, "reader");
        assert!(repo.list_by_entry(2).await.unwrap().is_empty());
    }
}
