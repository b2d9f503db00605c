//! BookVision auth API server binary.
//!
//! Reads configuration from flags / environment (optionally a `.env` file),
//! opens the credential store and serves the auth API until Ctrl-C.

use std::sync::Arc;

use bookvision_api::config::{ApiConfig, UsernameChangePolicy};
use bookvision_core::auth::{
    CredentialStore, InMemoryCredentialStore, PgCredentialStore, jwt::DEFAULT_LIFETIME_HOURS,
};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "bookvision_api_server", about = "BookVision auth API server")]
struct Args {
    /// Interface to listen on.
    #[arg(long, env = "SERVER_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 = ephemeral).
    #[arg(long, env = "SERVER_PORT", default_value_t = 8080)]
    port: u16,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL", required_unless_present = "in_memory")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,

    /// Keep users in process memory instead of PostgreSQL. Nothing survives a
    /// restart.
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    /// HMAC secret used to sign tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Token lifetime in hours.
    #[arg(long, env = "JWT_EXPIRES_IN", default_value_t = DEFAULT_LIFETIME_HOURS)]
    jwt_expires_in: i64,

    /// Whether profile updates may change the username (`unique` | `locked`).
    #[arg(long, env = "USERNAME_CHANGE_POLICY", default_value = "unique")]
    username_change_policy: UsernameChangePolicy,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,bookvision_api=debug,bookvision_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    let config = ApiConfig::new(
        format!("{}:{}", args.host, args.port),
        args.jwt_secret,
        args.jwt_expires_in,
        args.username_change_policy,
    )?;

    info!(
        version = bookvision_core::version(),
        bind_addr = %config.bind_addr,
        token_lifetime_hours = config.token.lifetime_hours(),
        username_changes = ?config.profile_policy.username_changes,
        "starting bookvision_api_server"
    );

    let store: Arc<dyn CredentialStore> = match args.database_url.filter(|_| !args.in_memory) {
        Some(database_url) => {
            info!(max_connections = args.max_connections, "connecting to PostgreSQL");
            let pool = PgPoolOptions::new()
                .max_connections(args.max_connections)
                .acquire_timeout(std::time::Duration::from_secs(30))
                .connect(&database_url)
                .await?;

            info!("running database migrations");
            bookvision_core::migrate::migrate(&pool).await?;

            Arc::new(PgCredentialStore::new(pool))
        }
        None => {
            warn!("using in-memory credential store; users are lost on exit");
            Arc::new(InMemoryCredentialStore::new())
        }
    };

    // Refuse to serve if the store cannot answer.
    store.ping().await?;

    let state = bookvision_api::AppState::new(store, config.clone());
    let app = bookvision_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
