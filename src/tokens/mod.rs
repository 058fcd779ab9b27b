
pub mod models;
pub mod queries;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};
use uuid::Uuid;

pub use models::{DownloadToken, RedeemOutcome};
pub use queries::TokenQueries;

pub type DbPool = Pool<Sqlite>;

/// Source of truth for download-token expiry. Tokens carry an absolute
/// `expires` timestamp and the store also garbage-collects past-expiry rows,
/// so a token is usable if and only if its row exists and `now < expires`.
#[derive(Debug, Clone)]
pub struct TokenStore {
    pool: DbPool,
    ttl: Duration,
}

impl TokenStore {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P, ttl_hours: i64) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create token database connection pool")?;

        let store = Self {
            pool,
            ttl: Duration::hours(ttl_hours),
        };
        store.run_migrations().await?;

        Ok(store)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running token database migrations");

        sqlx::migrate!("src/tokens/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run token schema migration")?;

        debug!("Token database migrations completed");
        Ok(())
    }

    /// Issue a fresh token for `email`/`file_name`: a globally-unique opaque
    /// string with an absolute expiry of now plus the configured window.
    #[inline]
    pub async fn issue(&self, email: &str, file_name: &str) -> Result<DownloadToken> {
        // Opportunistic TTL garbage collection on the write path.
        TokenQueries::purge_expired(&self.pool, Self::now_ms()).await?;

        let token = Uuid::new_v4().to_string();
        let expires = Utc::now()
            .checked_add_signed(self.ttl)
            .map(|t| t.timestamp_millis())
            .ok_or_else(|| anyhow::anyhow!("Token expiry overflow"))?;

        let record = TokenQueries::create(&self.pool, &token, email, file_name, expires).await?;
        debug!("Issued download token for {} ({})", email, file_name);
        Ok(record)
    }

    /// Fetch a token. Rows past their expiry are reported absent even before
    /// garbage collection removes them.
    #[inline]
    pub async fn get(&self, token: &str) -> Result<Option<DownloadToken>> {
        let record = TokenQueries::get(&self.pool, token).await?;
        Ok(record.filter(|r| r.expires > Self::now_ms()))
    }

    /// Redeem a token. The expiry check and the count increment happen in a
    /// single conditional update, so the 0 -> 1 transition is observed by
    /// exactly one caller even under concurrent redemptions. An expired row
    /// is deleted on detection and cannot be revived.
    #[inline]
    pub async fn redeem(&self, token: &str) -> Result<RedeemOutcome> {
        let now_ms = Self::now_ms();

        if let Some(record) = TokenQueries::increment_if_live(&self.pool, token, now_ms).await? {
            return Ok(RedeemOutcome::Redeemed(record));
        }

        // The conditional update matched nothing: either the row is gone or
        // its expiry has passed.
        match TokenQueries::get(&self.pool, token).await? {
            Some(_) => {
                TokenQueries::delete(&self.pool, token).await?;
                debug!("Deleted expired download token");
                Ok(RedeemOutcome::Expired)
            }
            None => Ok(RedeemOutcome::NotFound),
        }
    }

    #[inline]
    pub async fn delete(&self, token: &str) -> Result<bool> {
        TokenQueries::delete(&self.pool, token).await
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }
}
