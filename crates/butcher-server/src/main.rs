mod api;
mod auth;
mod middleware;
mod notifications;

use std::{net::SocketAddr, sync::Arc};

use butcher_notify::{Notifier, NotifyService};
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, default_rate_limit_state, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(butcher_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = butcher_db::PoolConfig::from_app_config(&config);
    let pool = butcher_db::connect_pool(&config.database_url, pool_config).await?;
    butcher_db::run_migrations(&pool).await?;
    if butcher_db::seed_defaults(&pool).await? {
        tracing::info!("created default shop settings");
    }

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let notifier: Arc<dyn Notifier> = Arc::new(NotifyService::from_config(&config)?);
    let state = AppState::from_config(pool, &config, notifier);
    let app = build_app(state, default_rate_limit_state(), config.cors_origin.as_deref());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = ?config.env, "butcher server listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
