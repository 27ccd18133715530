use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use medportal::api::api_router;
use medportal::app_state::AppState;
use medportal::config::Config;
use medportal::db::open_database;
use medportal::registration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(medportal::config::default_log_filter())),
        )
        .init();

    let config = Config::from_env();
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Opening runs migrations; the connection itself is per-request later.
    let mut conn = open_database(&config.db_path)?;
    tracing::info!(db = %config.db_path.display(), "database ready");

    if let Some(password) = &config.admin_password {
        let created = registration::seed_default_admin(
            &mut conn,
            &config.admin_email,
            &config.admin_username,
            password,
        )?;
        if created {
            tracing::info!(username = %config.admin_username, "bootstrap admin created");
        }
    }
    drop(conn);

    let state = Arc::new(AppState::from_config(&config));
    let app = api_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
