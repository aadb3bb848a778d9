pub mod api;
pub mod cache;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod service;
pub mod store;

use api::create_api_router;
use axum::Router;
use cache::MemoryCache;
use db::Database;
use jwt::TokenCodec;
use service::SessionService;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use store::SqliteCredentialStore;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing access tokens
    pub signing_key: Vec<u8>,
    /// Access-token lifetime
    pub access_ttl: Duration,
    /// Refresh-token lifetime
    pub refresh_ttl: Duration,
    /// TTL for email-keyed cache entries
    pub email_cache_ttl: Duration,
    /// TTL for refresh-hash-keyed cache entries
    pub refresh_cache_ttl: Duration,
    /// bcrypt cost factor for password hashing
    pub bcrypt_cost: u32,
}

/// Wire up the session service from configuration.
pub fn build_service(config: &ServerConfig) -> Arc<SessionService> {
    let codec = Arc::new(TokenCodec::new(&config.signing_key));
    let store = Arc::new(SqliteCredentialStore::new(config.db.clone()));
    let cache = Arc::new(MemoryCache::new(
        config.email_cache_ttl,
        config.refresh_cache_ttl,
    ));

    Arc::new(SessionService::new(
        store,
        cache,
        codec,
        config.access_ttl,
        config.refresh_ttl,
        config.bcrypt_cost,
    ))
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let service = build_service(config);
    Router::new().nest("/api", create_api_router(service))
}

/// Run cleanup tasks and spawn the background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> (tokio::task::JoinHandle<()>, SocketAddr) {
    init_cleanup(&config.db).await;

    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    let local_addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    (handle, local_addr)
}
