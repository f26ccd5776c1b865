//! Postgres-backed [`UserStore`].
//!
//! Each digest write is one statement. The compare-and-swap relies on the
//! row lock taken by `UPDATE`, which re-checks the `WHERE` clause after any
//! concurrent writer commits.

use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgPool, Row,
};
use std::time::Duration;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::error::AuthError;
use super::store::{StoreFuture, User, UserStore};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const USER_COLUMNS: &str = r"
    id,
    identity,
    password_digest,
    EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix,
    EXTRACT(EPOCH FROM updated_at)::BIGINT AS updated_at_unix,
    EXTRACT(EPOCH FROM last_login_at)::BIGINT AS last_login_unix
";

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self { pool })
    }

    /// Create the `users` table if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the schema statements fail.
    pub async fn migrate(&self) -> Result<()> {
        let span = info_span!("db.query", db.system = "postgresql", db.operation = "MIGRATE");
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("Failed to apply users schema")?;
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn user_exists(&self, identity: &str) -> Result<bool, AuthError> {
        let query = "SELECT EXISTS(SELECT 1 FROM users WHERE identity = $1) AS exists";
        let span = db_span("SELECT", query);
        let row = sqlx::query(query)
            .bind(identity)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.try_get("exists")?)
    }
}

fn db_span(operation: &'static str, statement: &str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        identity: row.try_get("identity")?,
        password_digest: row.try_get("password_digest")?,
        created_at_unix: row.try_get("created_at_unix")?,
        updated_at_unix: row.try_get("updated_at_unix")?,
        last_login_unix: row.try_get("last_login_unix")?,
    })
}

impl UserStore for PgUserStore {
    fn create<'a>(&'a self, identity: &'a str, password_digest: &'a str) -> StoreFuture<'a, User> {
        Box::pin(async move {
            // ON CONFLICT keeps duplicate detection inside the single INSERT.
            let query = format!(
                r"
                INSERT INTO users (id, identity, password_digest)
                VALUES ($1, $2, $3)
                ON CONFLICT (identity) DO NOTHING
                RETURNING {USER_COLUMNS}
                "
            );
            let span = db_span("INSERT", &query);
            let row = sqlx::query(&query)
                .bind(Uuid::new_v4())
                .bind(identity)
                .bind(password_digest)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await?;
            match row {
                Some(row) => Ok(user_from_row(&row)?),
                None => Err(AuthError::DuplicateIdentity),
            }
        })
    }

    fn find_by_identity<'a>(&'a self, identity: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(async move {
            let query = format!("SELECT {USER_COLUMNS} FROM users WHERE identity = $1");
            let span = db_span("SELECT", &query);
            let row = sqlx::query(&query)
                .bind(identity)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await?;
            Ok(row.as_ref().map(user_from_row).transpose()?)
        })
    }

    fn update_digest<'a>(&'a self, identity: &'a str, new_digest: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let query =
                "UPDATE users SET password_digest = $2, updated_at = NOW() WHERE identity = $1";
            let span = db_span("UPDATE", query);
            let result = sqlx::query(query)
                .bind(identity)
                .bind(new_digest)
                .execute(&self.pool)
                .instrument(span)
                .await?;
            if result.rows_affected() == 0 {
                return Err(AuthError::NotFound);
            }
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
            let query = r"
                UPDATE users
                SET password_digest = $3, updated_at = NOW()
                WHERE identity = $1 AND password_digest = $2
            ";
            let span = db_span("UPDATE", query);
            let result = sqlx::query(query)
                .bind(identity)
                .bind(expected_digest)
                .bind(new_digest)
                .execute(&self.pool)
                .instrument(span)
                .await?;
            if result.rows_affected() == 1 {
                return Ok(());
            }
            if self.user_exists(identity).await? {
                Err(AuthError::InvalidCredentials)
            } else {
                Err(AuthError::NotFound)
            }
        })
    }

    fn record_login<'a>(&'a self, identity: &'a str, at_unix: i64) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let query = "UPDATE users SET last_login_at = to_timestamp($2::BIGINT) WHERE identity = $1";
            let span = db_span("UPDATE", query);
            let result = sqlx::query(query)
                .bind(identity)
                .bind(at_unix)
                .execute(&self.pool)
                .instrument(span)
                .await?;
            if result.rows_affected() == 0 {
                return Err(AuthError::NotFound);
            }
            Ok(())
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let acquire_span = info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            );
            let mut conn = self.pool.acquire().instrument(acquire_span).await?;
            let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
            conn.ping().instrument(ping_span).await?;
            Ok(())
        })
    }
}
