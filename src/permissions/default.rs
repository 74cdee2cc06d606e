//! Default permission policy

use super::{codenames, PermissionHandler};
use crate::models::{Category, Entry, EntryQuery, EntryStatus, Principal};

/// Policy used when no handler is configured.
///
/// Superusers may do anything. Everyone else needs the matching permission
/// codename, and entry changes additionally require being one of the
/// entry's authors.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPermissionHandler;

impl DefaultPermissionHandler {
    pub fn new() -> Self {
        Self
    }

    fn is_author_with(user: &Principal, entry: &Entry, perm: &str) -> bool {
        match user.id() {
            Some(id) if entry.has_author(id) => user.has_perm(perm),
            _ => false,
        }
    }
}

impl PermissionHandler for DefaultPermissionHandler {
    fn can_add_category(&self, user: &Principal) -> bool {
        user.is_superuser() || user.has_perm(codenames::ADD_CATEGORY)
    }

    // NOTE: checks the *add* codename, not a delete-specific one. Kept as the
    // established rule until the intended permission is confirmed.
    fn can_delete_category(&self, user: &Principal, _category: &Category) -> bool {
        user.is_superuser() || user.has_perm(codenames::ADD_CATEGORY)
    }

    // NOTE: checks the *delete* codename; same caveat as above.
    fn can_change_category(&self, user: &Principal, _category: &Category) -> bool {
        user.is_superuser() || user.has_perm(codenames::DELETE_CATEGORY)
    }

    fn can_create_entry(&self, user: &Principal) -> bool {
        user.is_superuser() || user.has_perm(codenames::ADD_ENTRY)
    }

    fn can_change_authors(&self, user: &Principal, _entry: &Entry) -> bool {
        user.is_superuser() || user.has_perm(codenames::CHANGE_AUTHOR)
    }

    fn can_change_entry(&self, user: &Principal, entry: &Entry) -> bool {
        user.is_superuser() || Self::is_author_with(user, entry, codenames::CHANGE_ENTRY)
    }

    fn can_change_status(&self, user: &Principal, entry: &Entry) -> bool {
        user.is_superuser() || Self::is_author_with(user, entry, codenames::CHANGE_STATUS)
    }

    fn can_comment_entry(&self, user: &Principal, entry: &Entry) -> bool {
        if user.is_superuser() {
            return true;
        }
        entry.comments_are_open() && user.is_authenticated()
    }

    fn filter_entries(&self, user: &Principal, qs: EntryQuery) -> EntryQuery {
        if user.is_superuser() || user.has_perm(codenames::VIEW_ALL) {
            return qs;
        }
        qs.filter_status(EntryStatus::Published)
    }
}



#[cfg(test)]
mod property_tests {
    use super::fixtures::*;
    use super::*;
    use crate::models::sample_entry;
    use proptest::prelude::*;

    fn status_strategy() -> impl Strategy<Value = EntryStatus> {
        prop_oneof![
            Just(EntryStatus::Draft),
            Just(EntryStatus::Hidden),
            Just(EntryStatus::Published)
        ]
    }

    fn perms_strategy() -> impl Strategy<Value = Vec<&'static str>> {
        prop::sample::subsequence(codenames::ALL.to_vec(), 0..=codenames::ALL.len())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn superuser_passes_every_predicate(
            status in status_strategy(),
            comment_enabled in any::<bool>(),
            authors in prop::collection::vec(1i64..50, 0..4),
        ) {
            let handler = DefaultPermissionHandler::new();
            let user = superuser(99);
            let mut entry = sample_entry(1, status, &authors);
            entry.comment_enabled = comment_enabled;
            let category = category();

            prop_assert!(handler.can_add_category(&user));
            prop_assert!(handler.can_delete_category(&user, &category));
            prop_assert!(handler.can_change_category(&user, &category));
            prop_assert!(handler.can_create_entry(&user));
            prop_assert!(handler.can_change_authors(&user, &entry));
            prop_assert!(handler.can_change_entry(&user, &entry));
            prop_assert!(handler.can_change_status(&user, &entry));
            prop_assert!(handler.can_comment_entry(&user, &entry));
        }

        #[test]
        fn non_author_never_changes_entry(
            perms in perms_strategy(),
            authors in prop::collection::vec(1i64..50, 0..4),
        ) {
            let handler = DefaultPermissionHandler::new();
            let user = user(100, &perms);
            let entry = sample_entry(1, EntryStatus::Draft, &authors);
            prop_assert!(!handler.can_change_entry(&user, &entry));
            prop_assert!(!handler.can_change_status(&user, &entry));
        }

        #[test]
        fn closed_comments_reject_non_superusers(perms in perms_strategy()) {
            let handler = DefaultPermissionHandler::new();
            let entry = sample_entry(1, EntryStatus::Published, &[]);
            prop_assert!(!handler.can_comment_entry(&user(5, &perms), &entry));
        }

        #[test]
        fn unprivileged_filter_keeps_only_published(
            statuses in prop::collection::vec(status_strategy(), 0..12),
        ) {
            let handler = DefaultPermissionHandler::new();
            let qs = handler.filter_entries(&user(5, &[codenames::ADD_ENTRY]), EntryQuery::all());
            let entries: Vec<_> = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| sample_entry(i as i64, *s, &[]))
                .collect();
            for entry in entries.iter().filter(|e| qs.matches(e)) {
                prop_assert_eq!(entry.status, EntryStatus::Published);
            }
            let expected = statuses.iter().filter(|s| **s == EntryStatus::Published).count();
            prop_assert_eq!(entries.iter().filter(|e| qs.matches(e)).count(), expected);
        }
    }
}
