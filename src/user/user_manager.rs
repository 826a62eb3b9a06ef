use super::auth::{
    AuthToken, AuthTokenValue, ReelraterHasher, UserAuthCredentials, UsernamePasswordCredentials,
};
use super::user_store::UserStore;
use crate::catalog_store::FieldViolation;
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

const MIN_HANDLE_LENGTH: usize = 3;

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("invalid registration")]
    Invalid(Vec<FieldViolation>),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Coordinates user creation, password credentials and session tokens over
/// a `UserStore`.
pub struct UserManager {
    user_store: Arc<dyn UserStore>,
}

impl UserManager {
    pub fn new(user_store: Arc<dyn UserStore>) -> Self {
        Self { user_store }
    }

    /// Creates a user with password credentials, reporting every violated
    /// field at once.
    pub fn register(&self, user_handle: &str, password: &str) -> Result<usize, RegisterError> {
        let mut violations = Vec::new();

        let handle = user_handle.trim();
        if handle.len() < MIN_HANDLE_LENGTH {
            violations.push(FieldViolation::new(
                "handle",
                format!("handle must be at least {} characters", MIN_HANDLE_LENGTH),
            ));
        } else if self.user_store.get_user_id(handle)?.is_some() {
            violations.push(FieldViolation::new("handle", "handle is already taken"));
        }

        if password.is_empty() {
            violations.push(FieldViolation::new("password", "password must not be empty"));
        }

        if !violations.is_empty() {
            return Err(RegisterError::Invalid(violations));
        }

        let user_id = self.user_store.create_user(handle)?;
        let credentials = UserAuthCredentials {
            user_id,
            username_password: Some(Self::create_hashed_password(user_id, password)?),
        };
        self.user_store.update_user_auth_credentials(credentials)?;

        Ok(user_id)
    }

    fn create_hashed_password(
        user_id: usize,
        password: &str,
    ) -> Result<UsernamePasswordCredentials> {
        let hasher = ReelraterHasher::Argon2;
        let salt = hasher.generate_b64_salt();
        let hash = hasher.hash(password.as_bytes(), &salt)?;
        Ok(UsernamePasswordCredentials {
            user_id,
            salt,
            hash,
            hasher,
            created: SystemTime::now(),
            last_tried: None,
            last_used: None,
        })
    }

    pub fn get_user_credentials(&self, user_handle: &str) -> Result<Option<UserAuthCredentials>> {
        self.user_store.get_user_auth_credentials(user_handle)
    }

    pub fn get_user_handle(&self, user_id: usize) -> Result<Option<String>> {
        self.user_store.get_user_handle(user_id)
    }

    pub fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        self.user_store.get_user_auth_token(value)
    }

    pub fn update_auth_token_last_used(&self, value: &AuthTokenValue) -> Result<()> {
        self.user_store
            .update_user_auth_token_last_used_timestamp(value)
    }

    pub fn generate_auth_token(&self, credentials: &UserAuthCredentials) -> Result<AuthToken> {
        let token = AuthToken {
            user_id: credentials.user_id,
            value: AuthTokenValue::generate(),
            created: SystemTime::now(),
            last_used: None,
        };
        self.user_store.add_user_auth_token(token.clone())?;
        Ok(token)
    }

    /// Deletes a token, but only if the authenticated user owns it.
    pub fn delete_auth_token(&self, user_id: usize, token_value: &AuthTokenValue) -> Result<()> {
        match self.user_store.delete_user_auth_token(token_value)? {
            Some(removed) => {
                if removed.user_id == user_id {
                    Ok(())
                } else {
                    self.user_store.add_user_auth_token(removed.clone())?;
                    bail!(
                        "Tried to delete auth token of user {}, but the authenticated user {} \
                         was not the owner.",
                        removed.user_id,
                        user_id
                    )
                }
            }
            None => bail!("Did not find auth token {}", token_value.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::SqliteUserStore;
    use tempfile::TempDir;

    fn manager() -> (TempDir, UserManager) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteUserStore::new(dir.path().join("user.db")).unwrap());
        (dir, UserManager::new(store))
    }

    fn violations(err: RegisterError) -> Vec<FieldViolation> {
        match err {
            RegisterError::Invalid(violations) => violations,
            RegisterError::Storage(err) => panic!("unexpected storage error: {}", err),
        }
    }

    #[test]
    fn register_then_verify_password() {
        let (_dir, manager) = manager();
        let user_id = manager.register("alice", "s3cret!").unwrap();

        let credentials = manager.get_user_credentials("alice").unwrap().unwrap();
        assert_eq!(credentials.user_id, user_id);
        let password = credentials.username_password.unwrap();
        assert!(password
            .hasher
            .verify("s3cret!", password.hash.as_str(), password.salt.as_str())
            .unwrap());
    }

    #[test]
    fn register_reports_all_violations() {
        let (_dir, manager) = manager();
        let violations = violations(manager.register("ab", "").unwrap_err());
        let fields: Vec<_> = violations.iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["handle", "password"]);
    }

    #[test]
    fn register_rejects_taken_handle() {
        let (_dir, manager) = manager();
        manager.register("alice", "pw").unwrap();
        let violations = violations(manager.register("alice", "pw").unwrap_err());
        assert_eq!(violations[0].field, "handle");
        assert!(violations[0].message.contains("taken"));
    }

    #[test]
    fn token_generation_and_owner_checked_deletion() {
        let (_dir, manager) = manager();
        let alice = manager.register("alice", "pw").unwrap();
        let bob = manager.register("bobby", "pw").unwrap();

        let credentials = manager.get_user_credentials("alice").unwrap().unwrap();
        let token = manager.generate_auth_token(&credentials).unwrap();
        assert_eq!(
            manager
                .get_auth_token(&token.value)
                .unwrap()
                .unwrap()
                .user_id,
            alice
        );

        // Another user cannot delete the token, and it survives the attempt
        assert!(manager.delete_auth_token(bob, &token.value).is_err());
        assert!(manager.get_auth_token(&token.value).unwrap().is_some());

        manager.delete_auth_token(alice, &token.value).unwrap();
        assert!(manager.get_auth_token(&token.value).unwrap().is_none());
    }
}
