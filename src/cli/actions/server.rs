use crate::{
    api,
    credentials::{
        AuthFlow, HasherConfig, MemoryUserStore, PasswordPolicy, PgUserStore, SecretHasher,
        TokenService, UserStore,
    },
};
use anyhow::{anyhow, Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub db_max_connections: u32,
    pub token_secret: Option<SecretString>,
    pub token_ttl_seconds: u64,
    pub password_min_length: usize,
    pub hasher: HasherConfig,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store, hasher or token service cannot be built, or the server fails.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let store: Arc<dyn UserStore> = match &args.dsn {
        Some(dsn) => {
            let store = PgUserStore::connect(dsn, args.db_max_connections).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            warn!("No DSN configured, users are kept in memory and lost on exit");
            Arc::new(MemoryUserStore::new())
        }
    };

    let hasher =
        SecretHasher::new(args.hasher).map_err(|err| anyhow!("Invalid Argon2 parameters: {err}"))?;

    let secret = args.token_secret.unwrap_or_else(|| {
        warn!("No token secret configured, tokens will not survive a restart");
        random_secret()
    });
    let tokens = TokenService::new(secret, Duration::from_secs(args.token_ttl_seconds))
        .context("Invalid token configuration")?;

    let policy = PasswordPolicy::default().with_min_length(args.password_min_length);

    let flow = AuthFlow::new(store, hasher, tokens, policy)
        .context("Failed to initialize auth flow")?;

    api::new(args.port, Arc::new(flow)).await
}

fn random_secret() -> SecretString {
    let mut bytes = [0_u8; 32];
    OsRng.fill_bytes(&mut bytes);
    SecretString::from(Base64UrlUnpadded::encode_string(&bytes))
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        (
            "store",
            args.dsn
                .as_deref()
                .map_or_else(|| "memory".to_string(), redact_dsn),
        ),
        ("db_max_connections", args.db_max_connections.to_string()),
        ("token_secret_set", args.token_secret.is_some().to_string()),
        ("token_ttl_seconds", args.token_ttl_seconds.to_string()),
        ("password_min_length", args.password_min_length.to_string()),
        (
            "argon2",
            format!(
                "m={},t={},p={}",
                args.hasher.memory_cost_kib, args.hasher.time_cost, args.hasher.parallelism
            ),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn banner() -> String {
    format!(
        "K E Y S T E A D - {} - {}",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    )
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn redacts_dsn_password() {
        let redacted = redact_dsn("postgres://keystead:hunter2@db:5432/keystead");
        assert!(!redacted.contains("hunter2"));
        assert!(redacted.contains("REDACTED"));
        assert_eq!(
            redact_dsn("postgres://keystead@db/keystead"),
            "postgres://keystead@db/keystead"
        );
        assert_eq!(redact_dsn("not a url"), "invalid-dsn");
    }

    #[test]
    fn random_secret_is_long_enough() {
        let first = random_secret();
        let second = random_secret();
        assert!(first.expose_secret().len() >= crate::credentials::token::MIN_SECRET_BYTES);
        assert_ne!(first.expose_secret(), second.expose_secret());
    }

    #[test]
    fn short_commit_trims() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit("abc"), "abc");
    }

    #[test]
    fn args_debug_hides_secret() {
        let args = Args {
            port: 8080,
            dsn: None,
            db_max_connections: 5,
            token_secret: Some(SecretString::from("super-secret-signing-key-0000000000")),
            token_ttl_seconds: 900,
            password_min_length: 8,
            hasher: HasherConfig::default(),
        };
        assert!(!format!("{args:?}").contains("super-secret"));
    }
}
