//! Shared test setup helpers.

use keygate::ServerConfig;
use keygate::db::Database;
use std::time::Duration;

pub const TEST_SIGNING_KEY: &[u8] = b"test-signing-key-for-integration-tests";

/// bcrypt cost for tests. The minimum keeps hashing fast; production cost
/// comes from configuration.
pub const TEST_BCRYPT_COST: u32 = 4;

/// Build a ServerConfig over a fresh in-memory database.
pub async fn test_config() -> ServerConfig {
    let db = Database::open(":memory:").await.expect("Failed to open db");

    ServerConfig {
        db,
        signing_key: TEST_SIGNING_KEY.to_vec(),
        access_ttl: Duration::from_secs(120),
        refresh_ttl: Duration::from_secs(3600),
        email_cache_ttl: Duration::from_secs(60),
        refresh_cache_ttl: Duration::from_secs(60),
        bcrypt_cost: TEST_BCRYPT_COST,
    }
}
