//! Extensible permission system
//!
//! Every mutating or visibility-sensitive operation on entries and
//! categories is decided by a single `PermissionHandler`, resolved once at
//! startup from the `permissions.handler` setting and shared read-only by
//! all requests.
//!
//! Methods starting with `can_` answer yes/no and never fail; callers turn
//! `false` into an access-denied response. `filter_entries` narrows a
//! queryset to what the user may see and returns it.
//!
//! To plug in a custom policy, implement the trait, register a factory for
//! it in a [`HandlerRegistry`] under a dotted name, and point the setting at
//! that name:
//!
//! ```ignore
//! use std::sync::Arc;
//! use zinnia::permissions::{HandlerRegistry, resolve_handler};
//!
//! let mut registry = HandlerRegistry::with_builtins();
//! registry.register("myblog.policies.EditorsOnly", || Arc::new(EditorsOnly))?;
//! let handler = resolve_handler(Some("myblog.policies.EditorsOnly"), &registry)?;
//! ```

mod default;
mod registry;
mod staff;

pub use default::DefaultPermissionHandler;
pub use registry::{resolve_handler, HandlerFactory, HandlerRegistry, ResolveError};
pub use staff::StaffPermissionHandler;

use std::sync::Arc;

use crate::models::{Category, Entry, EntryQuery, Principal};

/// Permission codenames
pub mod codenames {
    pub const ADD_CATEGORY: &str = "zinnia.can_add_category";
    pub const DELETE_CATEGORY: &str = "zinnia.can_delete_category";
    pub const ADD_ENTRY: &str = "zinnia.can_add_entry";
    pub const CHANGE_AUTHOR: &str = "zinnia.can_change_author";
    pub const CHANGE_ENTRY: &str = "zinnia.can_change_entry";
    pub const CHANGE_STATUS: &str = "zinnia.can_change_status";
    pub const VIEW_ALL: &str = "zinnia.can_view_all";

    /// Every codename the default policy consults
    pub const ALL: [&str; 7] = [
        ADD_CATEGORY,
        DELETE_CATEGORY,
        ADD_ENTRY,
        CHANGE_AUTHOR,
        CHANGE_ENTRY,
        CHANGE_STATUS,
        VIEW_ALL,
    ];
}

/// Authorization decisions for entries and categories.
///
/// Implementations must be pure: no I/O, no interior mutability, the same
/// answer for the same arguments.
pub trait PermissionHandler: Send + Sync {
    /// May `user` create a new category?
    fn can_add_category(&self, user: &Principal) -> bool;

    /// May `user` delete `category`?
    fn can_delete_category(&self, user: &Principal, category: &Category) -> bool;

    /// May `user` modify `category`?
    fn can_change_category(&self, user: &Principal, category: &Category) -> bool;

    /// May `user` create a new entry?
    fn can_create_entry(&self, user: &Principal) -> bool;

    /// May `user` change the authors of `entry`?
    fn can_change_authors(&self, user: &Principal, entry: &Entry) -> bool;

    /// May `user` modify `entry`?
    fn can_change_entry(&self, user: &Principal, entry: &Entry) -> bool;

    /// May `user` change the status of `entry`?
    fn can_change_status(&self, user: &Principal, entry: &Entry) -> bool;

    /// May `user` comment on `entry`?
    fn can_comment_entry(&self, user: &Principal, entry: &Entry) -> bool;

    /// Narrow `qs` to the entries `user` is allowed to see
    fn filter_entries(&self, user: &Principal, qs: EntryQuery) -> EntryQuery;
}

/// Shared handle stored in the application state
pub type DynPermissionHandler = Arc<dyn PermissionHandler>;
