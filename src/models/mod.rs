//! Data models
//!
//! This module contains the data structures used throughout the weblog:
//! - Database entities (Entry, Category, User, Site, Session, Comment)
//! - The request `Principal` the permission handler reasons about
//! - `EntryQuery`, the composable queryset over entries
//! - Input types for create/update operations

mod category;
mod comment;
mod entry;
mod query;
mod session;
mod site;
mod user;

pub use category::{Category, CreateCategoryInput, UpdateCategoryInput};
pub use comment::{Comment, CreateCommentInput};
pub use entry::{
    Author, CreateEntryInput, Entry, EntryStatus, UpdateEntryInput, DEFAULT_URL_PREFIX, TITLE_MAX_LENGTH,
};
pub use query::EntryQuery;
pub use session::Session;
pub use site::{Site, DEFAULT_SITE_ID};
pub use user::{CreateUserInput, Principal, User};

#[cfg(test)]
pub(crate) use entry::sample_entry;
