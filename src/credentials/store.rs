//! User records and the storage seam.
//!
//! Every write that touches a digest is a single atomic step per identity, so
//! concurrent readers see either the old or the new digest, never a mix.

use std::{collections::HashMap, future::Future, pin::Pin};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::AuthError;
use super::token::now_unix_seconds;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AuthError>> + Send + 'a>>;

#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub identity: String,
    pub password_digest: String,
    pub created_at_unix: i64,
    pub updated_at_unix: i64,
    pub last_login_unix: Option<i64>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("password_digest", &"***")
            .field("created_at_unix", &self.created_at_unix)
            .field("updated_at_unix", &self.updated_at_unix)
            .field("last_login_unix", &self.last_login_unix)
            .finish()
    }
}

pub trait UserStore: Send + Sync {
    /// Insert a new user, failing with `DuplicateIdentity` if it already exists.
    fn create<'a>(&'a self, identity: &'a str, password_digest: &'a str) -> StoreFuture<'a, User>;

    fn find_by_identity<'a>(&'a self, identity: &'a str) -> StoreFuture<'a, Option<User>>;

    /// Replace the digest unconditionally; `NotFound` if the user is missing.
    fn update_digest<'a>(&'a self, identity: &'a str, new_digest: &'a str) -> StoreFuture<'a, ()>;

    /// Replace the digest only if it still equals `expected_digest`.
    ///
    /// `NotFound` if the user is missing, `InvalidCredentials` if another
    /// writer replaced the digest first.
    fn swap_digest<'a>(
        &'a self,
        identity: &'a str,
        expected_digest: &'a str,
        new_digest: &'a str,
    ) -> StoreFuture<'a, ()>;

    fn record_login<'a>(&'a self, identity: &'a str, at_unix: i64) -> StoreFuture<'a, ()>;

    /// Cheap liveness probe for `/health`.
    fn ping(&self) -> StoreFuture<'_, ()>;
}

/// Process-local store, used when no database is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryUserStore {
    fn create<'a>(&'a self, identity: &'a str, password_digest: &'a str) -> StoreFuture<'a, User> {
        Box::pin(async move {
            if password_digest.is_empty() {
                return Err(AuthError::Internal("refusing empty password digest".to_string()));
            }
            let mut users = self.users.write().await;
            if users.contains_key(identity) {
                return Err(AuthError::DuplicateIdentity);
            }
            let now = now_unix_seconds();
            let user = User {
                id: Uuid::new_v4(),
                identity: identity.to_string(),
                password_digest: password_digest.to_string(),
                created_at_unix: now,
                updated_at_unix: now,
                last_login_unix: None,
            };
            users.insert(identity.to_string(), user.clone());
            Ok(user)
        })
    }

    fn find_by_identity<'a>(&'a self, identity: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(async move { Ok(self.users.read().await.get(identity).cloned()) })
    }

    fn update_digest<'a>(&'a self, identity: &'a str, new_digest: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if new_digest.is_empty() {
                return Err(AuthError::Internal("refusing empty password digest".to_string()));
            }
            let mut users = self.users.write().await;
            let user = users.get_mut(identity).ok_or(AuthError::NotFound)?;
            user.password_digest = new_digest.to_string();
            user.updated_at_unix = now_unix_seconds();
            Ok(())
        })
    }

    fn swap_digest<'a>(
        &'a self,
        identity: &'a str,
        expected_digest: &'a str,
        new_digest: &'a str,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if new_digest.is_empty() {
                return Err(AuthError::Internal("refusing empty password digest".to_string()));
            }
            let mut users = self.users.write().await;
            let user = users.get_mut(identity).ok_or(AuthError::NotFound)?;
            if user.password_digest != expected_digest {
                return Err(AuthError::InvalidCredentials);
            }
            user.password_digest = new_digest.to_string();
            user.updated_at_unix = now_unix_seconds();
            Ok(())
        })
    }

    fn record_login<'a>(&'a self, identity: &'a str, at_unix: i64) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut users = self.users.write().await;
            let user = users.get_mut(identity).ok_or(AuthError::NotFound)?;
            user.last_login_unix = Some(at_unix);
            Ok(())
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}
