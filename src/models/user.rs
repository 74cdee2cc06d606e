//! User model
//!
//! This module defines the User entity and the request `Principal`.
//!
//! Users carry a superuser flag, a staff flag and a set of permission
//! codenames (`zinnia.can_add_entry`, ...). The permission handler never
//! looks at users directly; it works on a `Principal`, which also covers
//! anonymous visitors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// User entity representing a registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Holds every permission implicitly
    pub is_superuser: bool,
    /// May access editorial tooling
    pub is_staff: bool,
    /// Inactive accounts hold no permissions and cannot log in
    pub is_active: bool,
    /// Granted permission codenames
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active, unprivileged user.
    ///
    /// The password must already be hashed; see `services::password::hash_password`.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            password_hash,
            is_superuser: false,
            is_staff: false,
            is_active: true,
            permissions: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check a permission codename.
    ///
    /// Active superusers hold every permission; inactive users hold none.
    pub fn has_perm(&self, perm: &str) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_superuser || self.permissions.contains(perm)
    }
}

/// The actor behind a request
#[derive(Debug, Clone, Default)]
pub enum Principal {
    /// No valid session
    #[default]
    Anonymous,
    /// Logged-in user
    User(User),
}

impl Principal {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Principal::User(_))
    }

    pub fn is_superuser(&self) -> bool {
        match self {
            Principal::User(user) => user.is_active && user.is_superuser,
            Principal::Anonymous => false,
        }
    }

    pub fn is_staff(&self) -> bool {
        match self {
            Principal::User(user) => user.is_active && user.is_staff,
            Principal::Anonymous => false,
        }
    }

    /// Anonymous principals hold no permissions
    pub fn has_perm(&self, perm: &str) -> bool {
        match self {
            Principal::User(user) => user.has_perm(perm),
            Principal::Anonymous => false,
        }
    }

    /// User ID, if authenticated
    pub fn id(&self) -> Option<i64> {
        self.user().map(|u| u.id)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::User(user) => Some(user),
            Principal::Anonymous => None,
        }
    }

    /// Display name for templates and logs
    pub fn username(&self) -> &str {
        match self {
            Principal::User(user) => &user.username,
            Principal::Anonymous => "anonymous",
        }
    }
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Principal::User(user)
    }
}

/// Input for creating a user (before password hashing)
#[derive(Debug, Clone, Default)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub permissions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(perms: &[&str]) -> User {
        let mut user = User::new("writer".to_string(), "writer@example.com".to_string(), "hash".to_string());
        user.id = 7;
        user.permissions = perms.iter().map(|p| p.to_string()).collect();
        user
    }

    #[test]
    fn test_user_new_is_unprivileged() {
        let user = User::new("u".to_string(), "u@example.com".to_string(), "hash".to_string());
        assert_eq!(user.id, 0);
        assert!(user.is_active);
        assert!(!user.is_superuser);
        assert!(!user.is_staff);
        assert!(user.permissions.is_empty());
    }

    #[test]
    fn test_has_perm_explicit_grant() {
        let user = user_with(&["zinnia.can_add_entry"]);
        assert!(user.has_perm("zinnia.can_add_entry"));
        assert!(!user.has_perm("zinnia.can_change_entry"));
    }

    #[test]
    fn test_superuser_has_every_perm() {
        let mut user = user_with(&[]);
        user.is_superuser = true;
        assert!(user.has_perm("zinnia.anything"));
    }

    #[test]
    fn test_inactive_user_has_no_perms() {
        let mut user = user_with(&["zinnia.can_add_entry"]);
        user.is_superuser = true;
        user.is_active = false;
        assert!(!user.has_perm("zinnia.can_add_entry"));
        assert!(!Principal::User(user).is_superuser());
    }

    #[test]
    fn test_anonymous_principal() {
        let anon = Principal::Anonymous;
        assert!(!anon.is_authenticated());
        assert!(!anon.is_superuser());
        assert!(!anon.is_staff());
        assert!(!anon.has_perm("zinnia.can_view_all"));
        assert_eq!(anon.id(), None);
        assert_eq!(anon.username(), "anonymous");
    }

    #[test]
    fn test_user_principal() {
        let principal: Principal = user_with(&["zinnia.can_view_all"]).into();
        assert!(principal.is_authenticated());
        assert!(principal.has_perm("zinnia.can_view_all"));
        assert_eq!(principal.id(), Some(7));
        assert_eq!(principal.username(), "writer");
    }
}
