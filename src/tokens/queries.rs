use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::models::DownloadToken;

pub struct TokenQueries;

impl TokenQueries {
    #[inline]
    pub async fn create(
        pool: &SqlitePool,
        token: &str,
        email: &str,
        file_name: &str,
        expires: i64,
    ) -> Result<DownloadToken> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "INSERT INTO download_tokens (token, email, file_name, expires, download_count, created_date) \
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(token)
        .bind(email)
        .bind(file_name)
        .bind(expires)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create download token")?;

        Self::get(pool, token)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created token"))
    }

    /// Fetch a token row regardless of expiry.
    #[inline]
    pub async fn get(pool: &SqlitePool, token: &str) -> Result<Option<DownloadToken>> {
        let result = sqlx::query_as::<_, DownloadToken>(
            "SELECT token, email, file_name, expires, download_count, created_date \
             FROM download_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to get download token")?;

        Ok(result)
    }

    /// Atomically increment the download count of a live token and return the
    /// updated row. The expiry check and the increment happen in one
    /// statement, so concurrent redemptions serialize and exactly one caller
    /// observes each count value.
    #[inline]
    pub async fn increment_if_live(
        pool: &SqlitePool,
        token: &str,
        now_ms: i64,
    ) -> Result<Option<DownloadToken>> {
        let result = sqlx::query_as::<_, DownloadToken>(
            "UPDATE download_tokens SET download_count = download_count + 1 \
             WHERE token = ? AND expires > ? \
             RETURNING token, email, file_name, expires, download_count, created_date",
        )
        .bind(token)
        .bind(now_ms)
        .fetch_optional(pool)
        .await
        .context("Failed to redeem download token")?;

        Ok(result)
    }

    #[inline]
    pub async fn delete(pool: &SqlitePool, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM download_tokens WHERE token = ?")
            .bind(token)
            .execute(pool)
            .await
            .context("Failed to delete download token")?;

        Ok(result.rows_affected() > 0)
    }

    /// Store-level TTL garbage collection: drop every row past its expiry.
    #[inline]
    pub async fn purge_expired(pool: &SqlitePool, now_ms: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM download_tokens WHERE expires <= ?")
            .bind(now_ms)
            .execute(pool)
            .await
            .context("Failed to purge expired tokens")?;

        let purged = result.rows_affected();
        if purged > 0 {
            debug!("Purged {} expired download tokens", purged);
        }
        Ok(purged)
    }
}
