use thiserror::Error;

/// Why a candidate password was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyViolation {
    TooShort { min: usize },
    TooLong { max: usize },
    MissingCharacterClasses { required: usize },
    SameAsCurrent,
    ConfirmationMismatch,
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort { min } => write!(f, "password must be at least {min} characters"),
            Self::TooLong { max } => write!(f, "password must be at most {max} characters"),
            Self::MissingCharacterClasses { required } => write!(
                f,
                "password must mix at least {required} of: lowercase, uppercase, digits, symbols"
            ),
            Self::SameAsCurrent => write!(f, "new password must differ from the current password"),
            Self::ConfirmationMismatch => write!(f, "password confirmation does not match"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity already registered")]
    DuplicateIdentity,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("weak password: {0}")]
    WeakPassword(PolicyViolation),
    #[error("invalid identity")]
    InvalidIdentity,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("invalid token signature")]
    BadSignature,
    #[error("malformed token")]
    Malformed,
    #[error("user not found")]
    NotFound,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code used in API error bodies.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DuplicateIdentity => "duplicate_identity",
            // NotFound never leaves the service under its own name.
            Self::InvalidCredentials | Self::NotFound => "invalid_credentials",
            Self::WeakPassword(_) => "weak_password",
            Self::InvalidIdentity => "invalid_identity",
            Self::Expired => "token_expired",
            Self::NotYetValid => "token_not_yet_valid",
            Self::BadSignature => "bad_signature",
            Self::Malformed => "malformed_token",
            Self::Internal(_) => "internal_error",
        }
    }

    /// True for errors raised while validating a bearer token.
    #[must_use]
    pub const fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::Expired | Self::NotYetValid | Self::BadSignature | Self::Malformed
        )
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(format!("storage: {err}"))
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}
