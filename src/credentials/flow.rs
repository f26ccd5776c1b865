//! Register, login and password change.
//!
//! Every operation validates from scratch; nothing is cached per user. Argon2
//! work runs on the blocking pool so request tasks are not stalled.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::error::{AuthError, PolicyViolation};
use super::hasher::SecretHasher;
use super::policy::{normalize_identity, valid_identity, PasswordPolicy};
use super::store::{User, UserStore};
use super::token::{now_unix_seconds, Token, TokenService};

pub struct AuthFlow {
    store: Arc<dyn UserStore>,
    hasher: Arc<SecretHasher>,
    tokens: TokenService,
    policy: PasswordPolicy,
    // Verified against on unknown identities so login timing does not leak existence.
    decoy_digest: String,
}

impl std::fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFlow")
            .field("tokens", &self.tokens)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Input for a password change; plaintexts stay wrapped until hashed.
pub struct PasswordChange {
    pub current_password: SecretString,
    pub new_password: SecretString,
    pub confirm_new_password: Option<SecretString>,
}

impl AuthFlow {
    /// # Errors
    /// Returns an error if the decoy digest cannot be computed.
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: SecretHasher,
        tokens: TokenService,
        policy: PasswordPolicy,
    ) -> Result<Self, AuthError> {
        let decoy_digest = hasher.hash(&ulid::Ulid::new().to_string())?;
        Ok(Self {
            store,
            hasher: Arc::new(hasher),
            tokens,
            policy,
            decoy_digest,
        })
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[must_use]
    pub fn store(&self) -> &dyn UserStore {
        self.store.as_ref()
    }

    /// Create an account. Does not log the user in.
    ///
    /// # Errors
    /// `InvalidIdentity`, `DuplicateIdentity`, `WeakPassword`, or `Internal`.
    #[instrument(skip(self, password, confirm_password))]
    pub async fn register(
        &self,
        identity: &str,
        password: &SecretString,
        confirm_password: Option<&SecretString>,
    ) -> Result<User, AuthError> {
        let identity = normalize_identity(identity);
        if !valid_identity(&identity) {
            return Err(AuthError::InvalidIdentity);
        }

        if self.store.find_by_identity(&identity).await?.is_some() {
            debug!("identity already registered");
            return Err(AuthError::DuplicateIdentity);
        }

        self.policy
            .check(password.expose_secret())
            .map_err(AuthError::WeakPassword)?;
        if let Some(confirm) = confirm_password {
            if confirm.expose_secret() != password.expose_secret() {
                return Err(AuthError::WeakPassword(PolicyViolation::ConfirmationMismatch));
            }
        }

        let digest = self.hash(password.clone()).await?;
        // A racing registration for the same identity is rejected here.
        let user = self.store.create(&identity, &digest).await?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Check credentials and issue a bearer token.
    ///
    /// Unknown identities and wrong passwords produce the same error.
    ///
    /// # Errors
    /// `InvalidCredentials` or `Internal`.
    #[instrument(skip(self, password))]
    pub async fn login(&self, identity: &str, password: &SecretString) -> Result<Token, AuthError> {
        let identity = normalize_identity(identity);
        let user = self.store.find_by_identity(&identity).await?;

        let Some(user) = user else {
            let _ = self
                .verify(password.clone(), self.decoy_digest.clone())
                .await?;
            debug!("login for unknown identity");
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .verify(password.clone(), user.password_digest.clone())
            .await?
        {
            debug!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        match self.store.record_login(&identity, now_unix_seconds()).await {
            Ok(()) => {}
            Err(AuthError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(err) => return Err(err),
        }

        let token = self.tokens.issue(&user.identity)?;
        info!(user_id = %user.id, token_id = token.token_id(), "token issued");
        Ok(token)
    }

    /// Resolve a bearer token to the stored user.
    ///
    /// # Errors
    /// Token validation errors unchanged, `InvalidCredentials` if the user vanished.
    #[instrument(skip(self, token))]
    pub async fn current_user(&self, token: &str) -> Result<User, AuthError> {
        let identity = self.tokens.validate(token)?;
        self.store
            .find_by_identity(&identity)
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }

    /// Replace the password of the token's owner after re-verifying the current one.
    ///
    /// The token alone proves a session, not recent knowledge of the secret,
    /// so the current password is always checked. Existing tokens stay valid.
    ///
    /// # Errors
    /// Token validation errors unchanged, `InvalidCredentials`, `WeakPassword`, or `Internal`.
    #[instrument(skip(self, token, change))]
    pub async fn change_password(
        &self,
        token: &str,
        change: PasswordChange,
    ) -> Result<(), AuthError> {
        let identity = self.tokens.validate(token)?;

        let user = self
            .store
            .find_by_identity(&identity)
            .await?
            .ok_or_else(|| {
                warn!("valid token for missing user");
                AuthError::InvalidCredentials
            })?;

        if !self
            .verify(change.current_password.clone(), user.password_digest.clone())
            .await?
        {
            debug!(user_id = %user.id, "password change with wrong current password");
            return Err(AuthError::InvalidCredentials);
        }

        self.policy
            .check_change(
                change.current_password.expose_secret(),
                change.new_password.expose_secret(),
            )
            .map_err(AuthError::WeakPassword)?;
        if let Some(confirm) = &change.confirm_new_password {
            if confirm.expose_secret() != change.new_password.expose_secret() {
                return Err(AuthError::WeakPassword(PolicyViolation::ConfirmationMismatch));
            }
        }

        let new_digest = self.hash(change.new_password).await?;
        match self
            .store
            .swap_digest(&identity, &user.password_digest, &new_digest)
            .await
        {
            Ok(()) => {
                info!(user_id = %user.id, "password changed");
                Ok(())
            }
            Err(AuthError::NotFound) => Err(AuthError::InvalidCredentials),
            Err(err) => Err(err),
        }
    }

    async fn hash(&self, plaintext: SecretString) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(plaintext.expose_secret())).await?
    }

    async fn verify(&self, plaintext: SecretString, digest: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        Ok(tokio::task::spawn_blocking(move || hasher.verify(plaintext.expose_secret(), &digest))
            .await?)
    }
}
