//! Entry queryset
//!
//! `EntryQuery` is a pure, composable description of a set of entries.
//! Narrowing methods consume and return the query so permission handlers
//! can take a query and hand back a filtered one without touching storage.
//! Repositories translate it to SQL; `matches` evaluates it in memory.

use super::entry::{Entry, EntryStatus};

/// Composable filter over entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryQuery {
    /// Allowed statuses; `None` means any status
    statuses: Option<Vec<EntryStatus>>,
    /// Sites the entry must be attached to, all of them
    sites: Vec<i64>,
    /// Users the entry must credit, all of them
    authors: Vec<i64>,
    limit: Option<i64>,
    offset: i64,
}

impl EntryQuery {
    /// Query matching every entry
    pub fn all() -> Self {
        Self::default()
    }

    /// Keep only entries with the given status.
    ///
    /// Successive calls intersect, so filtering on two different statuses
    /// yields an empty set.
    pub fn filter_status(mut self, status: EntryStatus) -> Self {
        self.statuses = Some(match self.statuses.take() {
            Some(mut current) => {
                current.retain(|s| *s == status);
                current
            }
            None => vec![status],
        });
        self
    }

    /// Keep only entries attached to the given site.
    ///
    /// Chained calls keep entries attached to every named site.
    pub fn on_site(mut self, site_id: i64) -> Self {
        if !self.sites.contains(&site_id) {
            self.sites.push(site_id);
        }
        self
    }

    /// Keep only entries credited to the given user.
    ///
    /// Chained calls keep entries credited to every named user.
    pub fn by_author(mut self, user_id: i64) -> Self {
        if !self.authors.contains(&user_id) {
            self.authors.push(user_id);
        }
        self
    }

    /// Limit the number of returned entries
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit.max(0));
        self
    }

    /// Skip the first `offset` entries
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset.max(0);
        self
    }

    pub fn statuses(&self) -> Option<&[EntryStatus]> {
        self.statuses.as_deref()
    }

    pub fn site_ids(&self) -> &[i64] {
        &self.sites
    }

    pub fn author_ids(&self) -> &[i64] {
        &self.authors
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    pub fn offset_value(&self) -> i64 {
        self.offset
    }

    /// Whether the query restricts entries by status at all
    pub fn is_status_filtered(&self) -> bool {
        self.statuses.is_some()
    }

    /// Evaluate the filters (not the pagination) against a single entry
    pub fn matches(&self, entry: &Entry) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&entry.status) {
                return false;
            }
        }
        self.sites.iter().all(|site_id| entry.is_on_site(*site_id))
            && self.authors.iter().all(|user_id| entry.has_author(*user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::entry::sample_entry;

    #[test]
    fn test_all_matches_every_status() {
        let query = EntryQuery::all();
        for status in EntryStatus::ALL {
            assert!(query.matches(&sample_entry(1, status, &[])));
        }
        assert!(!query.is_status_filtered());
    }

    #[test]
    fn test_filter_status() {
        let query = EntryQuery::all().filter_status(EntryStatus::Published);
        assert!(query.matches(&sample_entry(1, EntryStatus::Published, &[])));
        assert!(!query.matches(&sample_entry(2, EntryStatus::Draft, &[])));
        assert!(!query.matches(&sample_entry(3, EntryStatus::Hidden, &[])));
    }

    #[test]
    fn test_filter_status_intersects() {
        let query = EntryQuery::all()
            .filter_status(EntryStatus::Published)
            .filter_status(EntryStatus::Draft);
        assert_eq!(query.statuses(), Some(&[][..]));
        for status in EntryStatus::ALL {
            assert!(!query.matches(&sample_entry(1, status, &[])));
        }

        let same = EntryQuery::all()
            .filter_status(EntryStatus::Published)
            .filter_status(EntryStatus::Published);
        assert_eq!(same.statuses(), Some(&[EntryStatus::Published][..]));
    }

    #[test]
    fn test_site_and_author_filters() {
        let entry = sample_entry(1, EntryStatus::Published, &[4]);
        assert!(EntryQuery::all().on_site(1).matches(&entry));
        assert!(!EntryQuery::all().on_site(2).matches(&entry));
        assert!(EntryQuery::all().by_author(4).matches(&entry));
        assert!(!EntryQuery::all().by_author(5).matches(&entry));
    }

    #[test]
    fn test_site_and_author_filters_narrow() {
        let entry = sample_entry(1, EntryStatus::Published, &[4]);
        assert!(!EntryQuery::all().on_site(2).on_site(1).matches(&entry));
        assert!(!EntryQuery::all().on_site(1).on_site(2).matches(&entry));
        assert!(!EntryQuery::all().by_author(5).by_author(4).matches(&entry));
        assert!(EntryQuery::all().on_site(1).on_site(1).matches(&entry));
        assert_eq!(EntryQuery::all().on_site(1).on_site(1).site_ids(), &[1]);

        let mut shared = sample_entry(2, EntryStatus::Published, &[4, 5]);
        shared.sites = vec![1, 2];
        assert!(EntryQuery::all().on_site(2).on_site(1).matches(&shared));
        assert!(EntryQuery::all().by_author(5).by_author(4).matches(&shared));
    }

    #[test]
    fn test_pagination_is_clamped() {
        let query = EntryQuery::all().limit(-3).offset(-1);
        assert_eq!(query.limit_value(), Some(0));
        assert_eq!(query.offset_value(), 0);
    }
}
