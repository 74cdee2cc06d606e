//! User service
//!
//! Implements business logic for accounts and authentication:
//! - Bootstrap registration (the first user becomes a superuser)
//! - Account creation and permission grants by superusers
//! - Login/logout with session tokens
//! - Session validation

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User};
use crate::permissions::codenames;
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::Duration;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// User already exists
    #[error("User already exists: {0}")]
    UserExists(String),

    /// User not found
    #[error("User not found: {0}")]
    NotFound(i64),

    /// Self-registration is only open while no account exists
    #[error("Registration is closed")]
    RegistrationClosed,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_lifetime: Duration,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    /// Create a new user service with custom session expiration
    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_lifetime: Duration::days(session_expiration_days),
        }
    }

    /// Register the bootstrap account.
    ///
    /// Only succeeds while no user exists; the account becomes a superuser.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        if !self.is_first_user().await? {
            return Err(UserServiceError::RegistrationClosed);
        }

        let user = self
            .create_user(CreateUserInput {
                username: input.username,
                email: input.email,
                password: input.password,
                is_superuser: true,
                is_staff: true,
                permissions: Vec::new(),
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "Bootstrap superuser registered");
        Ok(user)
    }

    /// Create an account with the given flags and permission codenames
    pub async fn create_user(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        validate_create_input(&input)?;
        let permissions = validate_codenames(&input.permissions)?;

        let username = input.username.trim().to_string();
        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username uniqueness")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(username));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let mut user = User::new(username, input.email.trim().to_string(), password_hash);
        user.is_superuser = input.is_superuser;
        user.is_staff = input.is_staff;
        user.permissions = permissions;

        let created = self.user_repo.create(&user).await.context("Failed to create user")?;
        info!(user_id = created.id, username = %created.username, "User created");
        Ok(created)
    }

    /// Replace the permission codenames of a user
    pub async fn set_permissions(&self, user_id: i64, permissions: &[String]) -> Result<User, UserServiceError> {
        let permissions = validate_codenames(permissions)?;
        self.get_required(user_id).await?;

        self.user_repo
            .set_permissions(user_id, &permissions)
            .await
            .context("Failed to set permissions")?;
        info!(user_id, permissions = ?permissions, "User permissions replaced");
        self.get_required(user_id).await
    }

    /// Check credentials and open a session
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .user_repo
            .get_by_username(input.username.trim())
            .await
            .context("Failed to get user by username")?
            .ok_or_else(|| {
                warn!(username = %input.username, "Login failed: unknown user");
                invalid()
            })?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            warn!(user_id = user.id, "Login failed: wrong password");
            return Err(invalid());
        }

        if !user.is_active {
            return Err(UserServiceError::AuthenticationError(
                "This account is inactive".to_string(),
            ));
        }

        let session = Session::start(user.id, self.session_lifetime);
        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        info!(user_id = user.id, "User logged in");
        Ok(created)
    }

    /// Logout (invalidate session)
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown or expired tokens yield `None`; expired sessions are removed.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(|u| u.is_active))
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await.context("Failed to get user by ID")?)
    }

    /// Check if no account exists yet
    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    async fn get_required(&self, id: i64) -> Result<User, UserServiceError> {
        self.get_by_id(id).await?.ok_or(UserServiceError::NotFound(id))
    }
}

fn validate_create_input(input: &CreateUserInput) -> Result<(), UserServiceError> {
    if input.username.trim().is_empty() {
        return Err(UserServiceError::ValidationError("Username cannot be empty".to_string()));
    }
    if input.email.trim().is_empty() {
        return Err(UserServiceError::ValidationError("Email cannot be empty".to_string()));
    }
    if !input.email.contains('@') {
        return Err(UserServiceError::ValidationError("Invalid email format".to_string()));
    }
    if input.password.is_empty() {
        return Err(UserServiceError::ValidationError("Password cannot be empty".to_string()));
    }
    Ok(())
}

/// Only the application's own codenames can be granted
fn validate_codenames(permissions: &[String]) -> Result<BTreeSet<String>, UserServiceError> {
    let mut granted = BTreeSet::new();
    for perm in permissions {
        let perm = perm.trim();
        if !codenames::ALL.iter().any(|known| *known == perm) {
            return Err(UserServiceError::ValidationError(format!("Unknown permission: {}", perm)));
        }
        granted.insert(perm.to_string());
    }
    Ok(granted)
}

/// Input for bootstrap registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    /// Create a new registration input
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    /// Create a new login input
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
    }

    fn editor_input(username: &str, permissions: &[&str]) -> CreateUserInput {
        CreateUserInput {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "password123".to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_registration_is_superuser_then_closed() {
        let service = setup_test_service().await;
        assert!(service.is_first_user().await.unwrap());

        let admin = service
            .register(RegisterInput::new("admin", "admin@example.com", "password123"))
            .await
            .unwrap();
        assert!(admin.is_superuser);
        assert!(admin.is_staff);

        let second = service
            .register(RegisterInput::new("late", "late@example.com", "password123"))
            .await;
        assert!(matches!(second, Err(UserServiceError::RegistrationClosed)));
    }

    #[tokio::test]
    async fn test_create_user_with_permissions() {
        let service = setup_test_service().await;
        let user = service
            .create_user(editor_input("writer", &[codenames::ADD_ENTRY, codenames::CHANGE_ENTRY]))
            .await
            .unwrap();

        assert!(!user.is_superuser);
        assert!(user.has_perm(codenames::ADD_ENTRY));
        assert!(user.has_perm(codenames::CHANGE_ENTRY));
        assert!(!user.has_perm(codenames::CHANGE_STATUS));

        let duplicate = service.create_user(editor_input("writer", &[])).await;
        assert!(matches!(duplicate, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_create_user_rejects_unknown_permission() {
        let service = setup_test_service().await;
        let result = service
            .create_user(editor_input("writer", &["zinnia.can_fly"]))
            .await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_set_permissions_replaces_grants() {
        let service = setup_test_service().await;
        let user = service
            .create_user(editor_input("writer", &[codenames::ADD_ENTRY]))
            .await
            .unwrap();

        let updated = service
            .set_permissions(user.id, &[codenames::VIEW_ALL.to_string()])
            .await
            .unwrap();
        assert!(!updated.has_perm(codenames::ADD_ENTRY));
        assert!(updated.has_perm(codenames::VIEW_ALL));

        assert!(matches!(
            service.set_permissions(999, &[]).await,
            Err(UserServiceError::NotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_login_logout_and_session_validation() {
        let service = setup_test_service().await;
        let user = service.create_user(editor_input("writer", &[])).await.unwrap();

        let wrong = service.login(LoginInput::new("writer", "nope")).await;
        assert!(matches!(wrong, Err(UserServiceError::AuthenticationError(_))));
        let unknown = service.login(LoginInput::new("ghost", "password123")).await;
        assert!(matches!(unknown, Err(UserServiceError::AuthenticationError(_))));

        let session = service
            .login(LoginInput::new("writer", "password123"))
            .await
            .unwrap();
        let current = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(current.id, user.id);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert!(service.validate_session("bogus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = UserService::with_session_expiration(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            -1,
        );
        service.create_user(editor_input("writer", &[])).await.unwrap();

        let session = service
            .login(LoginInput::new("writer", "password123"))
            .await
            .unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }
}
