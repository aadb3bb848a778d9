//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use clap::Parser;
use std::time::Duration;
use tracing::{error, info};

const MIN_SIGNING_KEY_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "keygate", about = "Credential and session-token service")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "keygate.db")]
    pub database: String,

    /// Path to file containing the token signing key.
    /// Prefer using the SIGNING_KEY env var instead
    #[arg(long)]
    pub signing_key_file: Option<String>,

    /// Access-token lifetime in seconds
    #[arg(long, env = "ACCESS_TTL_SECS", default_value = "7200")]
    pub access_ttl_secs: u64,

    /// Refresh-token lifetime in seconds
    #[arg(long, env = "REFRESH_TTL_SECS", default_value = "2592000")]
    pub refresh_ttl_secs: u64,

    /// TTL for email-keyed cache entries in seconds
    #[arg(long, default_value = "900")]
    pub email_cache_ttl_secs: u64,

    /// TTL for refresh-hash-keyed cache entries in seconds
    #[arg(long, default_value = "2700")]
    pub refresh_cache_ttl_secs: u64,

    /// bcrypt cost factor for password hashing
    #[arg(long, default_value = "12")]
    pub bcrypt_cost: u32,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the token signing key from environment variable or file.
/// Returns None and logs an error if the key cannot be loaded.
pub fn load_signing_key(signing_key_file: Option<&str>) -> Option<String> {
    let key = if let Ok(key) = std::env::var("SIGNING_KEY") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("SIGNING_KEY") };
        key
    } else if let Some(path) = signing_key_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read signing key file");
                return None;
            }
        }
    } else {
        error!(
            "Signing key is required. Set SIGNING_KEY environment variable (recommended) or use --signing-key-file"
        );
        return None;
    };

    if key.len() < MIN_SIGNING_KEY_LENGTH {
        error!(
            "Signing key is shorter than {} characters. Use a longer key",
            MIN_SIGNING_KEY_LENGTH
        );
        return None;
    }

    Some(key)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, signing_key: String) -> ServerConfig {
    ServerConfig {
        db,
        signing_key: signing_key.into_bytes(),
        access_ttl: Duration::from_secs(args.access_ttl_secs),
        refresh_ttl: Duration::from_secs(args.refresh_ttl_secs),
        email_cache_ttl: Duration::from_secs(args.email_cache_ttl_secs),
        refresh_cache_ttl: Duration::from_secs(args.refresh_cache_ttl_secs),
        bcrypt_cost: args.bcrypt_cost,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
