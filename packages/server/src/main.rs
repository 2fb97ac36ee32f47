use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, bail};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use server::authz::RolePolicy;
use server::config::{AppConfig, LogConfig};
use server::mailer::LogMailer;
use server::sessions::{MemorySessionCache, SessionCache};
use server::state::AppState;
use server::utils::jwt::JwtKeys;
use server::{build_router, database, seed};

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

fn init_tracing(log: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .with_context(|| format!("invalid log.level {:?}", log.level))?;

    match &log.path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

/// Periodically drop expired cache entries until shutdown.
fn spawn_purge(sessions: Arc<dyn SessionCache>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let purged = sessions.purge_expired().await;
                    if purged > 0 {
                        debug!(purged, "Purged expired sessions");
                    }
                }
            }
        }
    });
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutting down");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.log)?;

    if config.server.tls {
        bail!("server.tls is not supported; terminate TLS in front of agora");
    }

    let jwt = JwtKeys::from_config(&config.jwt).context("invalid jwt configuration")?;
    let policy = RolePolicy::load(config.roles.policy_path.as_deref())
        .context("failed to load role policy")?;

    let db = database::init_db(&config.db)
        .await
        .context("failed to connect to database")?;
    seed::ensure_indexes(&db)
        .await
        .context("failed to create indexes")?;

    let shutdown = CancellationToken::new();
    let sessions: Arc<dyn SessionCache> = Arc::new(MemorySessionCache::new());
    spawn_purge(sessions.clone(), shutdown.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;

    let state = AppState {
        db,
        config: Arc::new(config),
        jwt: Arc::new(jwt),
        sessions,
        mailer: Arc::new(LogMailer),
        policy: Arc::new(policy),
        shutdown: shutdown.clone(),
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Agora listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}
