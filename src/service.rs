//! Session orchestration: sign-up, sign-in, refresh, token parsing and
//! role changes over the two-tier storage model.
//!
//! The service is a stateless per-call orchestrator. The durable store is
//! authoritative; the cache is read-through and advisory. Cache population
//! after a durable hit runs as a detached task and is never awaited by the
//! triggering request, so cache coherence is eventual and best-effort only.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::cache::SessionCache;
use crate::db::{User, UserRole};
use crate::jwt::{Claims, TokenCodec, unix_now};
use crate::store::{CredentialStore, StoreError};

/// Raw token pair handed to the caller exactly once on sign-in.
#[derive(Debug, Clone)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Session-layer error taxonomy.
#[derive(Debug)]
pub enum AuthError {
    /// Duplicate unique key on create.
    Conflict,
    /// No matching user or token.
    NotFound,
    /// Unknown email or password mismatch.
    InvalidCredential,
    /// Signature, structure, or expiry failure.
    InvalidToken,
    /// Insufficient privilege for a mutating action.
    Unauthorized,
    /// Unexpected store/cache/codec failure.
    Internal(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Conflict => write!(f, "Email is already registered"),
            AuthError::NotFound => write!(f, "Not found"),
            AuthError::InvalidCredential => write!(f, "Invalid email or password"),
            AuthError::InvalidToken => write!(f, "Invalid or expired token"),
            AuthError::Unauthorized => write!(f, "Not enough rights"),
            AuthError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => AuthError::Conflict,
            StoreError::NotFound => AuthError::NotFound,
            StoreError::Database(err) => AuthError::Internal(err.to_string()),
        }
    }
}

/// Orchestrates the credential and session-token lifecycle.
///
/// All collaborators are injected; the service holds no mutable state of
/// its own and is cheap to share across request handlers.
pub struct SessionService {
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn SessionCache>,
    codec: Arc<TokenCodec>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    bcrypt_cost: u32,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn SessionCache>,
        codec: Arc<TokenCodec>,
        access_ttl: Duration,
        refresh_ttl: Duration,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            store,
            cache,
            codec,
            access_ttl,
            refresh_ttl,
            bcrypt_cost,
        }
    }

    /// Register a new user. Returns the new user id.
    ///
    /// Fails with `Conflict` if the email is already registered. The cache
    /// is populated by a detached task; its failure never fails the call.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<i64, AuthError> {
        let password_hash = bcrypt::hash(password, self.bcrypt_cost)
            .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))?;

        let user = self
            .store
            .create_user(username, email, &password_hash, UserRole::User)
            .await?;

        self.spawn_email_backfill(user.clone());

        Ok(user.id)
    }

    /// Exchange email + password for a fresh token pair.
    ///
    /// The refresh-token hash is persisted before the secrets are returned;
    /// a persistence failure is fatal to the call so the caller never holds
    /// a refresh token that was never stored.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Tokens, AuthError> {
        let user = self.lookup_by_email(email).await?;

        if !bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
            return Err(AuthError::InvalidCredential);
        }

        let access_token = self
            .codec
            .issue_access_token(&user, self.access_ttl)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let refresh_token = self.codec.issue_refresh_secret();
        let refresh_hash = self.codec.token_hash(&refresh_token);
        let expires_at = unix_now().map_err(|e| AuthError::Internal(e.to_string()))?
            + self.refresh_ttl.as_secs();

        self.store
            .save_refresh_token(user.id, &refresh_hash, expires_at)
            .await?;

        self.spawn_refresh_backfill(refresh_hash, user);

        Ok(Tokens {
            access_token,
            refresh_token,
        })
    }

    /// Exchange a refresh secret for a new access token bound to the
    /// owner's current identity and role.
    ///
    /// Expired refresh tokens are rejected at the durable lookup. A cache
    /// hit can honor a just-expired token for at most the refresh-keyspace
    /// TTL; that staleness window is bounded and accepted.
    pub async fn refresh_tokens(&self, raw_refresh_token: &str) -> Result<String, AuthError> {
        let refresh_hash = self.codec.token_hash(raw_refresh_token);

        let user = match self.cache.get_by_refresh_hash(&refresh_hash).await {
            Ok(Some(user)) => user,
            other => {
                if let Err(e) = other {
                    warn!("Session cache lookup by refresh hash failed: {}", e);
                }
                let user = self.store.get_user_by_refresh_hash(&refresh_hash).await?;
                self.spawn_refresh_backfill(refresh_hash, user.clone());
                user
            }
        };

        self.codec
            .issue_access_token(&user, self.access_ttl)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Verify an access token and return its claims. No store access.
    pub fn parse_token(&self, access_token: &str) -> Result<Claims, AuthError> {
        self.codec
            .verify_access_token(access_token)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Change a user's role. The actor's own verified role claim is the
    /// capability check; only admins may mutate roles.
    pub async fn change_role(
        &self,
        actor: &Claims,
        target_id: i64,
        new_role: UserRole,
    ) -> Result<(), AuthError> {
        if actor.role != UserRole::Admin {
            return Err(AuthError::Unauthorized);
        }

        let updated = self.store.update_role(target_id, new_role).await?;

        // Keep the email-keyed snapshot coherent so a stale role is not
        // served from the cache. Refresh-hash entries age out via TTL.
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            if let Err(e) = cache.put_role_update(&updated.email, updated.role).await {
                warn!("Can't update cached role for user: {}", e);
            }
        });

        Ok(())
    }

    /// Cache-aside user lookup by email. A cache miss or error falls back
    /// to the durable store and triggers a detached backfill.
    async fn lookup_by_email(&self, email: &str) -> Result<User, AuthError> {
        match self.cache.get_by_email(email).await {
            Ok(Some(user)) => Ok(user),
            other => {
                if let Err(e) = other {
                    warn!("Session cache lookup by email failed: {}", e);
                }
                let user = match self.store.get_user_by_email(email).await {
                    Ok(user) => user,
                    // Unknown email reads the same as a bad password.
                    Err(StoreError::NotFound) => return Err(AuthError::InvalidCredential),
                    Err(e) => return Err(e.into()),
                };
                self.spawn_email_backfill(user.clone());
                Ok(user)
            }
        }
    }

    fn spawn_email_backfill(&self, user: User) {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            if let Err(e) = cache.put_by_email(&user).await {
                warn!("Can't save user to cache: {}", e);
            }
        });
    }

    fn spawn_refresh_backfill(&self, refresh_hash: String, user: User) {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            if let Err(e) = cache.put_by_refresh_hash(&refresh_hash, &user).await {
                warn!("Can't save user to cache: {}", e);
            }
        });
    }
}
