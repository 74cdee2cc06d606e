//! Comment service
//!
//! Whether a principal may comment is decided by the permission handler;
//! this service only validates and stores the text.

use crate::db::repositories::CommentRepository;
use crate::models::{Comment, CreateCommentInput};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

/// Longest accepted comment body, in characters
pub const MAX_COMMENT_LENGTH: usize = 3000;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Comment service
pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>) -> Self {
        Self { repo }
    }

    /// Store a comment after trimming it
    pub async fn create(&self, mut input: CreateCommentInput) -> Result<Comment, CommentServiceError> {
        input.content = input.content.trim().to_string();
        if input.content.is_empty() {
            return Err(CommentServiceError::ValidationError("Comment cannot be empty".to_string()));
        }
        if input.content.chars().count() > MAX_COMMENT_LENGTH {
            return Err(CommentServiceError::ValidationError(format!(
                "Comment cannot exceed {} characters",
                MAX_COMMENT_LENGTH
            )));
        }

        let comment = self.repo.create(&input).await.context("Failed to create comment")?;
        info!(comment_id = comment.id, entry_id = comment.entry_id, "Comment posted");
        Ok(comment)
    }

    /// Comments of an entry, oldest first
    pub async fn list_for_entry(&self, entry_id: i64) -> Result<Vec<Comment>, CommentServiceError> {
        Ok(self
            .repo
            .list_by_entry(entry_id)
            .await
            .context("Failed to list comments")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::entry::test_support::{input, seeded_pool};
    use crate::db::repositories::{EntryRepository, SqlxCommentRepository, SqlxEntryRepository};
    use crate::models::EntryStatus;
    use chrono::Utc;

    async fn setup() -> (CommentService, i64) {
        let pool = seeded_pool().await;
        let entry = SqlxEntryRepository::new(pool.clone())
            .create(&input("Post", "post", EntryStatus::Published, &[1], &[1]), Utc::now())
            .await
            .unwrap();
        (CommentService::new(SqlxCommentRepository::boxed(pool)), entry.id)
    }

    #[tokio::test]
    async fn test_create_trims_and_lists() {
        let (service, entry_id) = setup().await;
        service
            .create(CreateCommentInput {
                entry_id,
                user_id: 2,
                content: "  Nice post!  ".to_string(),
            })
            .await
            .unwrap();

        let comments = service.list_for_entry(entry_id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content, "Nice post!");
        assert_eq!(comments[0].username, "bob");
    }

    #[tokio::test]
    async fn test_rejects_blank_and_oversized() {
        let (service, entry_id) = setup().await;
        let blank = service
            .create(CreateCommentInput {
                entry_id,
                user_id: 1,
                content: "   ".to_string(),
            })
            .await;
        assert!(matches!(blank, Err(CommentServiceError::ValidationError(_))));

        let long = service
            .create(CreateCommentInput {
                entry_id,
                user_id: 1,
                content: "x".repeat(MAX_COMMENT_LENGTH + 1),
            })
            .await;
        assert!(matches!(long, Err(CommentServiceError::ValidationError(_))));
    }
}
