use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted download-authorization record. `expires` is an absolute epoch
/// timestamp in milliseconds; `download_count` only ever grows, by exactly
/// one per successful redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DownloadToken {
    pub token: String,
    pub email: String,
    pub file_name: String,
    pub expires: i64,
    pub download_count: i64,
    pub created_date: NaiveDateTime,
}

/// Result of a redemption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// The token was valid; the returned record carries the post-increment
    /// count. A count of 1 marks the first download.
    Redeemed(DownloadToken),
    /// The token existed but its expiry had passed; the row has been deleted
    /// and the token cannot be revived.
    Expired,
    /// No such token (never issued, already purged, or already deleted).
    NotFound,
}
