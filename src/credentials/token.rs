//! Stateless bearer tokens.
//!
//! Wire form: `ks1.<payload>.<mac>` where `payload` is the base64url JSON of
//! [`TokenClaims`] and `mac` is HMAC-SHA256 over the encoded payload, both
//! unpadded. Validation needs only the signing secret, no storage.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, SystemTime};
use ulid::Ulid;

use super::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_PREFIX: &str = "ks1";
pub const MIN_SECRET_BYTES: usize = 32;
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 15 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// An issued token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct Token {
    value: String,
    claims: TokenClaims,
}

impl Token {
    /// The encoded bearer value handed to the client.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    #[must_use]
    pub fn issued_at(&self) -> i64 {
        self.claims.iat
    }

    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.claims.exp
    }

    #[must_use]
    pub fn token_id(&self) -> &str {
        &self.claims.jti
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.value
    }
}

pub struct TokenService {
    secret: SecretString,
    ttl_seconds: i64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"***")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl TokenService {
    /// # Errors
    /// Returns an error if the secret is shorter than 32 bytes or the TTL is zero.
    pub fn new(secret: SecretString, ttl: Duration) -> anyhow::Result<Self> {
        if secret.expose_secret().len() < MIN_SECRET_BYTES {
            anyhow::bail!("token signing secret must be at least {MIN_SECRET_BYTES} bytes");
        }
        let ttl_seconds = i64::try_from(ttl.as_secs())?;
        if ttl_seconds <= 0 {
            anyhow::bail!("token TTL must be at least one second");
        }
        Ok(Self {
            secret,
            ttl_seconds,
        })
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Issue a token for `identity` valid from now for the configured TTL.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if the claims cannot be encoded.
    pub fn issue(&self, identity: &str) -> Result<Token, AuthError> {
        self.issue_at(identity, now_unix_seconds())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if the claims cannot be encoded.
    pub fn issue_at(&self, identity: &str, now: i64) -> Result<Token, AuthError> {
        let claims = TokenClaims {
            sub: identity.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_seconds),
            jti: Ulid::new().to_string(),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|err| AuthError::Internal(format!("encode token claims: {err}")))?;
        let payload_b64 = Base64UrlUnpadded::encode_string(&payload);
        let mac = self.mac(payload_b64.as_bytes())?.finalize().into_bytes();
        let mac_b64 = Base64UrlUnpadded::encode_string(&mac);
        Ok(Token {
            value: format!("{TOKEN_PREFIX}.{payload_b64}.{mac_b64}"),
            claims,
        })
    }

    /// Validate a bearer value and return the identity it is bound to.
    ///
    /// # Errors
    /// `Malformed`, `BadSignature`, `Expired` or `NotYetValid`.
    pub fn validate(&self, token: &str) -> Result<String, AuthError> {
        self.validate_at(token, now_unix_seconds())
            .map(|claims| claims.sub)
    }

    /// Validate a bearer value against an explicit clock and return its claims.
    ///
    /// Structure is checked first, then the signature, then the time window,
    /// so a forged token is never reported as merely expired.
    ///
    /// # Errors
    /// `Malformed`, `BadSignature`, `Expired` or `NotYetValid`.
    pub fn validate_at(&self, token: &str, now: i64) -> Result<TokenClaims, AuthError> {
        let mut parts = token.split('.');
        let (Some(prefix), Some(payload_b64), Some(mac_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed);
        };
        if prefix != TOKEN_PREFIX || payload_b64.is_empty() || mac_b64.is_empty() {
            return Err(AuthError::Malformed);
        }

        let mac_bytes = Base64UrlUnpadded::decode_vec(mac_b64).map_err(|_| AuthError::Malformed)?;
        self.mac(payload_b64.as_bytes())?
            .verify_slice(&mac_bytes)
            .map_err(|_| AuthError::BadSignature)?;

        let payload =
            Base64UrlUnpadded::decode_vec(payload_b64).map_err(|_| AuthError::Malformed)?;
        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::Malformed)?;
        if claims.sub.is_empty() || claims.exp <= claims.iat {
            return Err(AuthError::Malformed);
        }

        if now < claims.iat {
            return Err(AuthError::NotYetValid);
        }
        if now >= claims.exp {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, message: &[u8]) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| AuthError::Internal("invalid token signing key".to_string()))?;
        mac.update(message);
        Ok(mac)
    }
}

/// Unix seconds for token issue and expiry checks.
pub(crate) fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) fn test_token_service() -> TokenService {
    let secret = SecretString::from("keystead-test-signing-secret-0123456789");
    match TokenService::new(secret, Duration::from_secs(DEFAULT_TOKEN_TTL_SECONDS)) {
        Ok(service) => service,
        Err(err) => panic!("test token service rejected: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn issue_and_validate() -> Result<(), AuthError> {
        let service = test_token_service();
        let token = service.issue_at("alice", NOW)?;
        assert_eq!(token.subject(), "alice");
        assert_eq!(token.issued_at(), NOW);
        assert_eq!(token.expires_at(), NOW + 900);
        assert!(token.as_str().starts_with("ks1."));

        let claims = service.validate_at(token.as_str(), NOW + 10)?;
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.jti, token.token_id());
        Ok(())
    }

    #[test]
    fn validate_uses_wall_clock() -> Result<(), AuthError> {
        let service = test_token_service();
        let token = service.issue("alice")?;
        assert_eq!(service.validate(token.as_str())?, "alice");
        Ok(())
    }

    #[test]
    fn token_ids_are_unique() -> Result<(), AuthError> {
        let service = test_token_service();
        let first = service.issue_at("alice", NOW)?;
        let second = service.issue_at("alice", NOW)?;
        assert_ne!(first.token_id(), second.token_id());
        assert_ne!(first.as_str(), second.as_str());
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<(), AuthError> {
        let service = test_token_service();
        let token = service.issue_at("alice", NOW)?;
        // the window is half-open: expires_at itself is already invalid
        let result = service.validate_at(token.as_str(), token.expires_at());
        assert!(matches!(result, Err(AuthError::Expired)));
        let result = service.validate_at(token.as_str(), NOW + 10_000);
        assert!(matches!(result, Err(AuthError::Expired)));
        Ok(())
    }

    #[test]
    fn future_token_is_rejected() -> Result<(), AuthError> {
        let service = test_token_service();
        let token = service.issue_at("alice", NOW)?;
        let result = service.validate_at(token.as_str(), NOW - 1);
        assert!(matches!(result, Err(AuthError::NotYetValid)));
        Ok(())
    }

    #[test]
    fn tampered_payload_is_rejected() -> Result<(), AuthError> {
        let service = test_token_service();
        let token = service.issue_at("alice", NOW)?;
        let forged_claims = TokenClaims {
            sub: "mallory".to_string(),
            iat: NOW,
            exp: NOW + 900,
            jti: token.token_id().to_string(),
        };
        let forged_payload = serde_json::to_vec(&forged_claims)
            .map_err(|err| AuthError::Internal(err.to_string()))?;
        let forged_b64 = Base64UrlUnpadded::encode_string(&forged_payload);
        let mut parts: Vec<&str> = token.as_str().split('.').collect();
        parts[1] = forged_b64.as_str();
        let forged = parts.join(".");

        let result = service.validate_at(&forged, NOW + 1);
        assert!(matches!(result, Err(AuthError::BadSignature)));
        Ok(())
    }

    #[test]
    fn tampered_expired_token_reports_signature() -> Result<(), AuthError> {
        let service = test_token_service();
        let token = service.issue_at("alice", NOW)?;
        let (head, mac_b64) = token
            .as_str()
            .rsplit_once('.')
            .ok_or(AuthError::Malformed)?;
        let flipped = if mac_b64.starts_with('A') { 'B' } else { 'A' };
        let forged = format!("{head}.{flipped}{}", &mac_b64[1..]);
        let result = service.validate_at(&forged, NOW + 10_000);
        assert!(matches!(result, Err(AuthError::BadSignature)));
        Ok(())
    }

    #[test]
    fn foreign_secret_is_rejected() -> Result<(), AuthError> {
        let service = test_token_service();
        let other = TokenService::new(
            SecretString::from("another-signing-secret-abcdefghijklmnop"),
            Duration::from_secs(60),
        )
        .map_err(|err| AuthError::Internal(err.to_string()))?;
        let token = other.issue_at("alice", NOW)?;
        let result = service.validate_at(token.as_str(), NOW + 1);
        assert!(matches!(result, Err(AuthError::BadSignature)));
        Ok(())
    }

    #[test]
    fn padded_token_is_malformed() -> Result<(), AuthError> {
        let service = test_token_service();
        let token = service.issue_at("alice", NOW)?;
        for input in [
            format!(" {}", token.as_str()),
            format!("{} ", token.as_str()),
            format!("{}\n", token.as_str()),
        ] {
            assert!(matches!(
                service.validate_at(&input, NOW),
                Err(AuthError::Malformed)
            ));
        }
        assert!(service.validate_at(token.as_str(), NOW).is_ok());
        Ok(())
    }

    #[test]
    fn garbage_is_malformed() {
        let service = test_token_service();
        for input in [
            "",
            "not-a-token",
            "ks1.only-two",
            "ks1.a.b.c",
            "ks2.abc.def",
            "ks1..def",
            "ks1.abc.!!!",
        ] {
            let result = service.validate_at(input, NOW);
            assert!(
                matches!(result, Err(AuthError::Malformed)),
                "expected Malformed for {input:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn signed_garbage_payload_is_malformed() -> Result<(), AuthError> {
        let service = test_token_service();
        let payload_b64 = Base64UrlUnpadded::encode_string(b"{\"not\":\"claims\"}");
        let mac = service.mac(payload_b64.as_bytes())?.finalize().into_bytes();
        let token = format!(
            "ks1.{payload_b64}.{}",
            Base64UrlUnpadded::encode_string(&mac)
        );
        let result = service.validate_at(&token, NOW);
        assert!(matches!(result, Err(AuthError::Malformed)));
        Ok(())
    }

    #[test]
    fn short_secret_is_refused() {
        let result = TokenService::new(SecretString::from("short"), Duration::from_secs(60));
        assert!(result.is_err());
    }

    #[test]
    fn zero_ttl_is_refused() {
        let result = TokenService::new(
            SecretString::from("keystead-test-signing-secret-0123456789"),
            Duration::ZERO,
        );
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let service = test_token_service();
        let debug = format!("{service:?}");
        assert!(!debug.contains("keystead-test-signing-secret"));
        assert!(debug.contains("***"));
    }
}
