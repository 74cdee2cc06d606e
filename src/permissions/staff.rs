//! Staff-gated permission policy

use super::{DefaultPermissionHandler, PermissionHandler};
use crate::models::{Category, Entry, EntryQuery, Principal};

/// Lets every active staff member edit entries.
///
/// Entry creation, changes, status and author changes are open to
/// superusers and staff without any codename. Category and comment rules
/// are the default ones. Staff see every entry regardless of status.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaffPermissionHandler {
    fallback: DefaultPermissionHandler,
}

impl StaffPermissionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_editor(user: &Principal) -> bool {
        user.is_superuser() || user.is_staff()
    }
}

impl PermissionHandler for StaffPermissionHandler {
    fn can_add_category(&self, user: &Principal) -> bool {
        self.fallback.can_add_category(user)
    }

    fn can_delete_category(&self, user: &Principal, category: &Category) -> bool {
        self.fallback.can_delete_category(user, category)
    }

    fn can_change_category(&self, user: &Principal, category: &Category) -> bool {
        self.fallback.can_change_category(user, category)
    }

    fn can_create_entry(&self, user: &Principal) -> bool {
        Self::is_editor(user)
    }

    fn can_change_authors(&self, user: &Principal, _entry: &Entry) -> bool {
        Self::is_editor(user)
    }

    fn can_change_entry(&self, user: &Principal, _entry: &Entry) -> bool {
        Self::is_editor(user)
    }

    fn can_change_status(&self, user: &Principal, _entry: &Entry) -> bool {
        Self::is_editor(user)
    }

    fn can_comment_entry(&self, user: &Principal, entry: &Entry) -> bool {
        self.fallback.can_comment_entry(user, entry)
    }

    fn filter_entries(&self, user: &Principal, qs: EntryQuery) -> EntryQuery {
        if user.is_staff() {
            return qs;
        }
        self.fallback.filter_entries(user, qs)
    }
}
