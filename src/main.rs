mod config;
mod domain;
mod routes;
mod services;
mod storage;

use axum_extra::extract::cookie::Key;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::Config;
use storage::BlobStore;

pub struct AppState {
    pub db: SqlitePool,
    pub storage: BlobStore,
    pub cookie_key: Key,
    pub config: Arc<Config>,
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect_with(connect_options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!(url = %config.database_url, "Database ready");

    let storage = BlobStore::new(config.storage_path.clone());
    storage.ensure_root().await?;
    tracing::info!(root = %storage.root().display(), "Attachment storage ready");

    if config.secret_key_base.is_none() {
        tracing::warn!("SECRET_KEY_BASE not set; sessions will not survive a restart");
    }

    match &config.mail {
        Some(mail) => tracing::info!(
            address = %mail.address,
            port = mail.port,
            domain = mail.domain.as_deref().unwrap_or("-"),
            user_name = mail.user_name.as_deref().unwrap_or("-"),
            has_password = mail.password.is_some(),
            authentication = mail.authentication,
            starttls = mail.enable_starttls_auto,
            default_url_host = mail.default_url_host.as_deref().unwrap_or("-"),
            "Mail relay configured"
        ),
        None => tracing::info!("Mail relay not configured"),
    }

    let addr = config.bind_addr();
    let state = Arc::new(AppState {
        db: pool,
        storage,
        cookie_key: config.cookie_key(),
        config: Arc::new(config),
    });

    let app = routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
