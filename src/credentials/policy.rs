//! Password strength and identity shape checks.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::PolicyViolation;

pub const DEFAULT_MIN_LENGTH: usize = 8;
pub const MAX_LENGTH: usize = 128;
const REQUIRED_CHARACTER_CLASSES: usize = 3;

const IDENTITY_MIN_LENGTH: usize = 3;
const IDENTITY_MAX_LENGTH: usize = 50;
const EMAIL_MAX_LENGTH: usize = 254;

static EMAIL: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

#[derive(Clone, Debug)]
pub struct PasswordPolicy {
    min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
        }
    }
}

impl PasswordPolicy {
    /// Raise the minimum length. Values below the default are clamped up to it.
    #[must_use]
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length.clamp(DEFAULT_MIN_LENGTH, MAX_LENGTH);
        self
    }

    #[must_use]
    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Check a candidate password: length bounds plus a mix of character classes.
    ///
    /// # Errors
    /// Returns the first violated rule.
    pub fn check(&self, password: &str) -> Result<(), PolicyViolation> {
        let length = password.chars().count();
        if length < self.min_length {
            return Err(PolicyViolation::TooShort {
                min: self.min_length,
            });
        }
        if length > MAX_LENGTH {
            return Err(PolicyViolation::TooLong { max: MAX_LENGTH });
        }
        if character_classes(password) < REQUIRED_CHARACTER_CLASSES {
            return Err(PolicyViolation::MissingCharacterClasses {
                required: REQUIRED_CHARACTER_CLASSES,
            });
        }
        Ok(())
    }

    /// Check a replacement password against the current one as well.
    ///
    /// # Errors
    /// Returns the violated rule.
    pub fn check_change(&self, current: &str, new: &str) -> Result<(), PolicyViolation> {
        self.check(new)?;
        if current == new {
            return Err(PolicyViolation::SameAsCurrent);
        }
        Ok(())
    }
}

fn character_classes(password: &str) -> usize {
    let lower = password.chars().any(char::is_lowercase);
    let upper = password.chars().any(char::is_uppercase);
    let digit = password.chars().any(|c| c.is_ascii_digit());
    let symbol = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());
    [lower, upper, digit, symbol]
        .into_iter()
        .filter(|present| *present)
        .count()
}

/// Normalize an identity for lookup and uniqueness checks.
#[must_use]
pub fn normalize_identity(identity: &str) -> String {
    identity.trim().to_lowercase()
}

/// Accept usernames of 3-50 characters, or email-shaped identities.
/// Expects already-normalized input.
#[must_use]
pub fn valid_identity(identity: &str) -> bool {
    if identity.chars().any(char::is_whitespace) {
        return false;
    }
    if identity.contains('@') {
        return identity.len() <= EMAIL_MAX_LENGTH && valid_email(identity);
    }
    let length = identity.chars().count();
    (IDENTITY_MIN_LENGTH..=IDENTITY_MAX_LENGTH).contains(&length)
}

fn valid_email(email: &str) -> bool {
    EMAIL.as_ref().is_some_and(|re| re.is_match(email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_mixed_passwords() {
        let policy = PasswordPolicy::default();
        assert_eq!(policy.check("Sup3rSecret!"), Ok(()));
        assert_eq!(policy.check("EvenBetter$1"), Ok(()));
        // three classes are enough
        assert_eq!(policy.check("lowerUPPER123"), Ok(()));
    }

    #[test]
    fn rejects_short_passwords() {
        let policy = PasswordPolicy::default();
        assert_eq!(
            policy.check("Ab1!"),
            Err(PolicyViolation::TooShort { min: 8 })
        );
    }

    #[test]
    fn rejects_long_passwords() {
        let policy = PasswordPolicy::default();
        let long = format!("Aa1!{}", "x".repeat(MAX_LENGTH));
        assert_eq!(
            policy.check(&long),
            Err(PolicyViolation::TooLong { max: MAX_LENGTH })
        );
    }

    #[test]
    fn rejects_single_class_passwords() {
        let policy = PasswordPolicy::default();
        assert_eq!(
            policy.check("alllowercaseletters"),
            Err(PolicyViolation::MissingCharacterClasses { required: 3 })
        );
        assert_eq!(
            policy.check("lowercase123"),
            Err(PolicyViolation::MissingCharacterClasses { required: 3 })
        );
    }

    #[test]
    fn min_length_is_clamped() {
        assert_eq!(PasswordPolicy::default().with_min_length(4).min_length(), 8);
        assert_eq!(
            PasswordPolicy::default().with_min_length(12).min_length(),
            12
        );
        let policy = PasswordPolicy::default().with_min_length(12);
        assert_eq!(
            policy.check("Sup3rSecret"),
            Err(PolicyViolation::TooShort { min: 12 })
        );
    }

    #[test]
    fn change_rejects_reuse() {
        let policy = PasswordPolicy::default();
        assert_eq!(
            policy.check_change("Sup3rSecret!", "Sup3rSecret!"),
            Err(PolicyViolation::SameAsCurrent)
        );
        assert_eq!(policy.check_change("Sup3rSecret!", "EvenBetter$1"), Ok(()));
    }

    #[test]
    fn normalize_identity_trims_and_lowercases() {
        assert_eq!(normalize_identity("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_identity_accepts_usernames_and_emails() {
        assert!(valid_identity("alice"));
        assert!(valid_identity("alice@example.com"));
    }

    #[test]
    fn valid_identity_rejects_bad_shapes() {
        assert!(!valid_identity("al"));
        assert!(!valid_identity(&"a".repeat(51)));
        assert!(!valid_identity("al ice"));
        assert!(!valid_identity("alice@example"));
        assert!(!valid_identity(""));
    }
}
