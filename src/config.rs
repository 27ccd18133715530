//! Runtime configuration, resolved from environment variables with local
//! defaults. Nothing here is required for a dev run: the server comes up
//! with a SQLite file under `~/.medportal` and localhost defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_TIPS_URL: &str = "http://localhost:11434";
const DEFAULT_TIPS_MODEL: &str = "medgemma";
const DEFAULT_TIPS_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub tips_url: String,
    pub tips_model: String,
    pub tips_timeout_secs: u64,
    pub admin_email: String,
    pub admin_username: String,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let db_path = env::var("MEDPORTAL_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir().join("medportal.db"));
        let bind_addr = env::var("MEDPORTAL_ADDR")
            .ok()
            .and_then(|addr| addr.parse().ok())
            .unwrap_or_else(|| {
                DEFAULT_BIND_ADDR
                    .parse()
                    .unwrap_or_else(|_| unreachable!())
            });
        Self {
            db_path,
            bind_addr,
            tips_url: env::var("MEDPORTAL_TIPS_URL")
                .unwrap_or_else(|_| DEFAULT_TIPS_URL.to_string()),
            tips_model: env::var("MEDPORTAL_TIPS_MODEL")
                .unwrap_or_else(|_| DEFAULT_TIPS_MODEL.to_string()),
            tips_timeout_secs: env::var("MEDPORTAL_TIPS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIPS_TIMEOUT_SECS),
            admin_email: env::var("MEDPORTAL_ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@medportal.local".to_string()),
            admin_username: env::var("MEDPORTAL_ADMIN_USERNAME")
                .unwrap_or_else(|_| "admin".to_string()),
            // No default password: the bootstrap admin is only seeded when
            // one is explicitly provided.
            admin_password: env::var("MEDPORTAL_ADMIN_PASSWORD").ok(),
        }
    }
}

/// Application data directory (`~/.medportal`, or the working directory as
/// a fallback when no home is resolvable).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".medportal")
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medportal=info"
}
