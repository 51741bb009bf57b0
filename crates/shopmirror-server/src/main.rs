mod api;
mod middleware;

use std::sync::Arc;

use shopmirror_ingest::{AuditSink, FileAuditLog, NoopAuditLog};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(shopmirror_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = shopmirror_db::PoolConfig::from_app_config(&config);
    let pool = shopmirror_db::connect_pool(&config.database_url, pool_config).await?;
    shopmirror_db::run_migrations(&pool).await?;

    let audit: Arc<dyn AuditSink> = match &config.audit_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "audit log enabled");
            Arc::new(FileAuditLog::new(dir)?)
        }
        None => Arc::new(NoopAuditLog),
    };

    let auth = AuthState::from_keys(
        &config.api_keys,
        matches!(config.env, shopmirror_core::Environment::Development),
    )?;
    let bind_addr = config.bind_addr;
    let app = build_app(
        AppState {
            pool,
            config,
            audit,
        },
        auth,
        default_rate_limit_state(),
    );

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "shopmirror server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
