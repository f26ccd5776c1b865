//! Credential lifecycle: hashing, signed tokens, user storage and the flows
//! that compose them.
//!
//! Plaintext passwords only exist for the duration of a call. Stores hold
//! Argon2id digests and never see a plaintext.

pub mod error;
pub mod flow;
pub mod hasher;
pub mod policy;
pub mod postgres;
pub mod store;
pub mod token;

pub use self::error::{AuthError, PolicyViolation};
pub use self::flow::{AuthFlow, PasswordChange};
pub use self::hasher::{HasherConfig, SecretHasher};
pub use self::policy::PasswordPolicy;
pub use self::postgres::PgUserStore;
pub use self::store::{MemoryUserStore, StoreFuture, User, UserStore};
pub use self::token::{Token, TokenClaims, TokenService};
