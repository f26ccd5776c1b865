use anyhow::Result;
use clap::{Arg, ArgMatches, Command};

pub const ARG_DSN: &str = "dsn";
pub const ARG_DB_MAX_CONNECTIONS: &str = "db-max-connections";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub dsn: Option<String>,
    pub max_connections: u32,
}

impl Options {
    /// # Errors
    /// Returns an error if the pool size is zero.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let max_connections = matches
            .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
            .copied()
            .unwrap_or(5);
        if max_connections == 0 {
            anyhow::bail!("--{ARG_DB_MAX_CONNECTIONS} must be at least 1");
        }
        Ok(Self {
            dsn: matches.get_one::<String>(ARG_DSN).cloned(),
            max_connections,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long("dsn")
                .help("Postgres connection string")
                .long_help(
                    "Postgres connection string. Without it users live in process memory and are lost on exit.",
                )
                .env("KEYSTEAD_DSN"),
        )
        .arg(
            Arg::new(ARG_DB_MAX_CONNECTIONS)
                .long("db-max-connections")
                .help("Maximum connections in the database pool")
                .env("KEYSTEAD_DB_MAX_CONNECTIONS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
}
