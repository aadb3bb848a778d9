//! Durable, authoritative credential storage.
//!
//! `CredentialStore` is the single source of truth for users and
//! refresh-token hashes. It is consulted whenever the session cache misses,
//! and its result always wins over a stale cache entry.

use async_trait::async_trait;

use crate::db::{Database, UserRole};
pub use crate::db::User;

/// Errors from the durable store.
#[derive(Debug)]
pub enum StoreError {
    /// A unique key (email) already exists.
    Conflict,
    /// No matching user or token.
    NotFound,
    /// Unexpected database failure.
    Database(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict => write!(f, "Record already exists"),
            StoreError::NotFound => write!(f, "Record not found"),
            StoreError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
                return StoreError::Conflict;
            }
        }
        StoreError::Database(e)
    }
}

/// Capability set of the durable credential tier.
///
/// Every write is atomic per row. Lookup misses fail with `NotFound`,
/// duplicate-email creates fail with `Conflict`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError>;

    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<User, StoreError>;

    async fn save_refresh_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: u64,
    ) -> Result<(), StoreError>;

    /// Resolve the owner of an unexpired refresh token by the token's hash.
    async fn get_user_by_refresh_hash(&self, hash: &str) -> Result<User, StoreError>;

    /// Change a user's role and return the updated record.
    async fn update_role(&self, user_id: i64, role: UserRole) -> Result<User, StoreError>;
}

/// SQLite-backed implementation over the shared connection pool.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    db: Database,
}

impl SqliteCredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.db
            .users()
            .get_by_email(email)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<User, StoreError> {
        let id = self
            .db
            .users()
            .create(username, email, password_hash, role)
            .await?;

        // Re-read so callers get the database-assigned timestamps.
        self.db
            .users()
            .get_by_id(id)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn save_refresh_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: u64,
    ) -> Result<(), StoreError> {
        self.db
            .refresh_tokens()
            .save(user_id, token_hash, expires_at)
            .await?;
        Ok(())
    }

    async fn get_user_by_refresh_hash(&self, hash: &str) -> Result<User, StoreError> {
        self.db
            .users()
            .get_by_refresh_hash(hash)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update_role(&self, user_id: i64, role: UserRole) -> Result<User, StoreError> {
        let updated = self.db.users().set_role(user_id, role).await?;
        if !updated {
            return Err(StoreError::NotFound);
        }

        self.db
            .users()
            .get_by_id(user_id)
            .await?
            .ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteCredentialStore {
        let db = Database::open(":memory:").await.unwrap();
        SqliteCredentialStore::new(db)
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = store().await;

        store
            .create_user("alice", "a@x.com", "hash-1", UserRole::User)
            .await
            .unwrap();

        let err = store
            .create_user("alice2", "a@x.com", "hash-2", UserRole::User)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn test_lookup_miss_is_not_found() {
        let store = store().await;

        assert!(matches!(
            store.get_user_by_email("nobody@x.com").await.unwrap_err(),
            StoreError::NotFound
        ));
        assert!(matches!(
            store.get_user_by_refresh_hash("th-none").await.unwrap_err(),
            StoreError::NotFound
        ));
        assert!(matches!(
            store.update_role(99, UserRole::Admin).await.unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[tokio::test]
    async fn test_update_role_returns_updated_user() {
        let store = store().await;

        let user = store
            .create_user("alice", "a@x.com", "hash-1", UserRole::User)
            .await
            .unwrap();

        let updated = store.update_role(user.id, UserRole::Seller).await.unwrap();
        assert_eq!(updated.id, user.id);
        assert_eq!(updated.role, UserRole::Seller);
    }
}
