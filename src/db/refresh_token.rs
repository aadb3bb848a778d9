//! Refresh-token persistence.
//!
//! Only the SHA-256 hash of a refresh secret is stored, never the secret
//! itself. One row is created per successful sign-in.

use sqlx::sqlite::SqlitePool;

/// A stored refresh-token record.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub created_at: String,
    pub updated_at: String,
    pub expires_at: String,
}

/// Store for refresh-token hashes.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a refresh-token hash for a user. Returns the row ID.
    pub async fn save(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: u64,
    ) -> Result<i64, sqlx::Error> {
        let expires_at_str = timestamp_to_datetime(expires_at);

        let result = sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(&expires_at_str)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get a refresh-token record by its hash.
    pub async fn get_by_hash(&self, hash: &str) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        let row: Option<(i64, i64, String, String, String, String)> = sqlx::query_as(
            "SELECT id, user_id, token_hash, created_at, updated_at, expires_at \
             FROM refresh_tokens WHERE token_hash = ?",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, user_id, token_hash, created_at, updated_at, expires_at)| RefreshTokenRecord {
                id,
                user_id,
                token_hash,
                created_at,
                updated_at,
                expires_at,
            },
        ))
    }

    /// Delete all expired refresh tokens.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < datetime('now')")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Convert a Unix timestamp to an ISO 8601 datetime string for SQLite.
fn timestamp_to_datetime(timestamp: u64) -> String {
    let days_since_epoch = timestamp / 86400;
    let time_of_day = timestamp % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = days_to_ymd(days_since_epoch as i64);

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year, month, day, hours, minutes, seconds
    )
}

/// Convert days since Unix epoch to year, month, day.
fn days_to_ymd(days: i64) -> (i32, u32, u32) {
    // Algorithm from http://howardhinnant.github.io/date_algorithms.html
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_to_datetime() {
        // 2024-01-15 12:30:45 UTC
        let ts = 1705321845;
        assert_eq!(timestamp_to_datetime(ts), "2024-01-15 12:30:45");
    }

    #[test]
    fn test_epoch() {
        assert_eq!(timestamp_to_datetime(0), "1970-01-01 00:00:00");
    }
}
