//! # RBAC Authorization Server
//!
//! HTTP server for the RBAC decision engine and its administration API.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `PORT` - HTTP server port (default: 8080)
//! - `DATABASE_URL` - Postgres connection string (in-memory store when unset)
//! - `RBAC_USER_ID_HEADER` - Header carrying the caller's user id (default: x-user-id)
//! - `RBAC_REQUEST_ID_HEADER` - Header carrying the request id (default: x-request-id)
//! - `RBAC_BOOTSTRAP_ADMIN` - User id seeded as admin into the in-memory store
//! - `RUST_LOG` - Log level (default: info)

use anyhow::Context;
use axum::serve;
use rbac_authz::web::{create_router, AppState};
use rbac_authz::{InMemoryRbacStore, NewUser, RbacStore, ServerConfig};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn build_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn RbacStore>> {
    if let Some(database_url) = &config.database_url {
        #[cfg(feature = "postgres")]
        {
            info!("Connecting to PostgreSQL store...");
            let store = rbac_authz::PostgresRbacStore::new(database_url)
                .await
                .context("failed to connect to the database")?;
            store.run_migrations().await.context("failed to run migrations")?;
            if config.bootstrap_admin.is_some() {
                warn!("RBAC_BOOTSTRAP_ADMIN is ignored for the PostgreSQL store");
            }
            return Ok(Arc::new(store));
        }

        #[cfg(not(feature = "postgres"))]
        {
            let _ = database_url;
            anyhow::bail!("DATABASE_URL is set but the server was built without the postgres feature");
        }
    }

    warn!("DATABASE_URL not set, using the in-memory store");
    let store = InMemoryRbacStore::new();
    if let Some(user_id) = &config.bootstrap_admin {
        store
            .insert_user(NewUser {
                user_id: user_id.clone(),
                username: user_id.clone(),
                admin: true,
            })
            .await
            .context("failed to seed the bootstrap admin")?;
        info!("Seeded bootstrap admin {}", user_id);
    }
    Ok(Arc::new(store))
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting RBAC Authorization Server v{}", rbac_authz::VERSION);

    let config = ServerConfig::from_env().context("invalid configuration")?;
    info!("Configuration:");
    info!("  Address: {}", config.bind_address());
    info!("  User id header: {}", config.user_id_header);
    info!("  Request id header: {}", config.request_id_header);

    let store = build_store(&config).await?;
    let state = AppState::new(store, &config).context("invalid configuration")?;
    let app = create_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Starting HTTP server on {}", addr);

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server shut down gracefully");
    Ok(())
}
