//! # Keystead
//!
//! `keystead` is a minimal credential store. Accounts are registered with an
//! identity and a password, logins return a short-lived bearer token, and a
//! token holder can rotate the password after proving the current one.
//!
//! ## Secrets at rest
//!
//! Passwords are stored as Argon2id PHC strings. The digest is never returned
//! by the API and is redacted from every `Debug` output.
//!
//! ## Tokens
//!
//! Tokens are stateless: `ks1.<claims>.<mac>` where the MAC is HMAC-SHA256
//! over the encoded claims. Validation needs only the signing secret, so
//! there is no session table. A password change does not revoke tokens
//! already issued; they expire on their own.

pub mod api;
pub mod cli;
pub mod credentials;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
