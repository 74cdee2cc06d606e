//! Services layer - Business logic
//!
//! Services are responsible for:
//! - Implementing business rules (slugs, validation, bootstrap accounts)
//! - Coordinating between repositories
//! - Mapping storage failures to per-service error types
//!
//! Authorization is not enforced here. Views and API handlers ask the
//! permission handler before calling a mutating service method.

pub mod category;
pub mod comment;
pub mod entry;
pub mod markup;
pub mod password;
pub mod slug;
pub mod user;

pub use category::{CategoryService, CategoryServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use entry::{EntryService, EntryServiceError};
pub use markup::MarkupRenderer;
pub use password::{hash_password, verify_password};
pub use slug::slugify;
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
