use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::credentials::{
    hasher::{DEFAULT_MEMORY_COST_KIB, DEFAULT_PARALLELISM, DEFAULT_TIME_COST},
    policy::{DEFAULT_MIN_LENGTH, MAX_LENGTH},
    token::{DEFAULT_TOKEN_TTL_SECONDS, MIN_SECRET_BYTES},
    HasherConfig,
};

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_PASSWORD_MIN_LENGTH: &str = "password-min-length";
pub const ARG_ARGON2_MEMORY_KIB: &str = "argon2-memory-kib";
pub const ARG_ARGON2_ITERATIONS: &str = "argon2-iterations";
pub const ARG_ARGON2_PARALLELISM: &str = "argon2-parallelism";

#[derive(Debug)]
pub struct Options {
    pub token_secret: Option<SecretString>,
    pub token_ttl_seconds: u64,
    pub password_min_length: usize,
    pub hasher: HasherConfig,
}

impl Options {
    /// # Errors
    /// Returns an error if the signing secret is too short, the TTL is zero,
    /// or the minimum password length is out of range.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let token_secret = matches.get_one::<String>(ARG_TOKEN_SECRET).cloned();
        if let Some(secret) = &token_secret {
            if secret.len() < MIN_SECRET_BYTES {
                anyhow::bail!("--{ARG_TOKEN_SECRET} must be at least {MIN_SECRET_BYTES} bytes");
            }
        }

        let token_ttl_seconds = matches
            .get_one::<u64>(ARG_TOKEN_TTL_SECONDS)
            .copied()
            .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS);
        if token_ttl_seconds == 0 {
            anyhow::bail!("--{ARG_TOKEN_TTL_SECONDS} must be at least 1");
        }

        let password_min_length = matches
            .get_one::<usize>(ARG_PASSWORD_MIN_LENGTH)
            .copied()
            .unwrap_or(DEFAULT_MIN_LENGTH);
        if !(DEFAULT_MIN_LENGTH..=MAX_LENGTH).contains(&password_min_length) {
            anyhow::bail!(
                "--{ARG_PASSWORD_MIN_LENGTH} must be between {DEFAULT_MIN_LENGTH} and {MAX_LENGTH}"
            );
        }

        let hasher = HasherConfig {
            memory_cost_kib: matches
                .get_one::<u32>(ARG_ARGON2_MEMORY_KIB)
                .copied()
                .unwrap_or(DEFAULT_MEMORY_COST_KIB),
            time_cost: matches
                .get_one::<u32>(ARG_ARGON2_ITERATIONS)
                .copied()
                .unwrap_or(DEFAULT_TIME_COST),
            parallelism: matches
                .get_one::<u32>(ARG_ARGON2_PARALLELISM)
                .copied()
                .unwrap_or(DEFAULT_PARALLELISM),
        };

        Ok(Self {
            token_secret: token_secret.map(SecretString::from),
            token_ttl_seconds,
            password_min_length,
            hasher,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_password_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long("token-secret")
                .help("HMAC secret used to sign bearer tokens (at least 32 bytes)")
                .long_help(
                    "HMAC secret used to sign bearer tokens, at least 32 bytes. When unset a random secret is generated and tokens do not survive a restart.",
                )
                .env("KEYSTEAD_TOKEN_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long("token-ttl-seconds")
                .help("Bearer token lifetime in seconds")
                .env("KEYSTEAD_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
}

fn with_password_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PASSWORD_MIN_LENGTH)
                .long("password-min-length")
                .help("Minimum password length (8 to 128)")
                .env("KEYSTEAD_PASSWORD_MIN_LENGTH")
                .default_value("8")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_ARGON2_MEMORY_KIB)
                .long("argon2-memory-kib")
                .help("Argon2id memory cost in KiB")
                .env("KEYSTEAD_ARGON2_MEMORY_KIB")
                .default_value("19456")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_ARGON2_ITERATIONS)
                .long("argon2-iterations")
                .help("Argon2id time cost")
                .env("KEYSTEAD_ARGON2_ITERATIONS")
                .default_value("2")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_ARGON2_PARALLELISM)
                .long("argon2-parallelism")
                .help("Argon2id lanes")
                .env("KEYSTEAD_ARGON2_PARALLELISM")
                .default_value("1")
                .value_parser(clap::value_parser!(u32)),
        )
}
