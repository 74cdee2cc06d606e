//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod category;
pub mod comment;
pub mod entry;
pub mod session;
pub mod site;
pub mod user;

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use entry::{EntryRepository, SqlxEntryRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use site::{SiteRepository, SqlxSiteRepository};
pub use user::{SqlxUserRepository, UserRepository};
