//! Ephemeral, advisory session cache.
//!
//! Two independent keyspaces with their own TTLs: user snapshots keyed by
//! email and by refresh-token hash. The cache never owns data; entries can
//! be lost, stale, or missing at any time and every consumer falls back to
//! the durable store. Concurrent backfills of the same key are
//! last-write-wins, which is fine because all writers derive the value from
//! the same durable row.

use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;

use crate::db::{User, UserRole};

const MAX_ENTRIES_PER_KEYSPACE: u64 = 10_000;

/// A cache-tier failure. Callers log these and fall back to the durable
/// store; a cache error must never surface as a user-facing failure.
#[derive(Debug)]
pub struct CacheError(pub String);

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cache error: {}", self.0)
    }
}

impl std::error::Error for CacheError {}

/// Capability set of the cache tier.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, CacheError>;

    async fn put_by_email(&self, user: &User) -> Result<(), CacheError>;

    async fn get_by_refresh_hash(&self, hash: &str) -> Result<Option<User>, CacheError>;

    async fn put_by_refresh_hash(&self, hash: &str, user: &User) -> Result<(), CacheError>;

    /// Rewrite the cached role for an email-keyed entry, if one exists.
    /// Used for cache coherence after a privileged role change; a miss is a
    /// no-op because a read-through repopulates from the durable store.
    async fn put_role_update(&self, email: &str, role: UserRole) -> Result<(), CacheError>;
}

/// In-process cache built on two moka caches with independent TTLs.
pub struct MemoryCache {
    by_email: Cache<String, User>,
    by_refresh_hash: Cache<String, User>,
}

impl MemoryCache {
    /// `email_ttl` bounds staleness of email-keyed snapshots (default 15 min),
    /// `refresh_ttl` bounds refresh-hash-keyed snapshots (default 45 min).
    pub fn new(email_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            by_email: Cache::builder()
                .time_to_live(email_ttl)
                .max_capacity(MAX_ENTRIES_PER_KEYSPACE)
                .build(),
            by_refresh_hash: Cache::builder()
                .time_to_live(refresh_ttl)
                .max_capacity(MAX_ENTRIES_PER_KEYSPACE)
                .build(),
        }
    }
}

#[async_trait]
impl SessionCache for MemoryCache {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, CacheError> {
        Ok(self.by_email.get(email).await)
    }

    async fn put_by_email(&self, user: &User) -> Result<(), CacheError> {
        self.by_email.insert(user.email.clone(), user.clone()).await;
        Ok(())
    }

    async fn get_by_refresh_hash(&self, hash: &str) -> Result<Option<User>, CacheError> {
        Ok(self.by_refresh_hash.get(hash).await)
    }

    async fn put_by_refresh_hash(&self, hash: &str, user: &User) -> Result<(), CacheError> {
        self.by_refresh_hash
            .insert(hash.to_string(), user.clone())
            .await;
        Ok(())
    }

    async fn put_role_update(&self, email: &str, role: UserRole) -> Result<(), CacheError> {
        if let Some(mut user) = self.by_email.get(email).await {
            user.role = role;
            self.by_email.insert(email.to_string(), user).await;
        }
        Ok(())
    }
}
