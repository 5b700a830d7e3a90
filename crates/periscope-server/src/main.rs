use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

mod app;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "periscope_server=info,periscope_scheduler=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit path > PERISCOPE_CONFIG env > ~/.periscope/periscope.toml
    let config_path = std::env::var("PERISCOPE_CONFIG").ok();
    let config = periscope_core::config::PeriscopeConfig::load(config_path.as_deref())
        .unwrap_or_else(|e| {
            tracing::warn!("Config load failed ({}), using defaults", e);
            periscope_core::config::PeriscopeConfig::default()
        });

    let bind = config.server.bind.clone();
    let port = config.server.port;

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");
    let store: Arc<dyn periscope_store::ScheduleStore> =
        Arc::new(periscope_store::SqliteStore::open(db_path)?);

    if config.research.api_key.is_empty() {
        tracing::warn!("no research API key configured — remote queries will fail");
    }
    let research: Arc<dyn periscope_research::ResearchClient> =
        Arc::new(periscope_research::PerplexityClient::with_timeout(
            config.research.api_key.clone(),
            Some(config.research.base_url.clone()),
            Duration::from_secs(config.research.timeout_secs),
        ));

    match config.webhook.url {
        Some(ref url) => info!(url = %url, "webhook deliveries enabled"),
        None => info!("no webhook URL configured — deliveries disabled"),
    }
    let notifier: Arc<dyn periscope_research::Notifier> =
        Arc::new(periscope_research::WebhookNotifier::with_timeout(
            config.webhook.url.clone(),
            Duration::from_secs(config.webhook.timeout_secs),
        ));

    let registry = Arc::new(periscope_scheduler::JobRegistry::new(
        periscope_scheduler::ExecutionContext {
            store: Arc::clone(&store),
            research: Arc::clone(&research),
            notifier: Arc::clone(&notifier),
        },
    ));

    // install triggers for every active schedule, then keep polling the
    // store so external edits are picked up without a restart
    let reconciler = Arc::new(periscope_scheduler::Reconciler::new(
        Arc::clone(&registry),
        Arc::clone(&store),
    ));
    let installed = reconciler.initialize_schedules();
    info!(count = installed, "schedules initialized");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let poll_interval = Duration::from_secs(config.scheduler.poll_interval_secs);
    {
        let reconciler = Arc::clone(&reconciler);
        tokio::spawn(async move {
            reconciler.watch_for_changes(poll_interval, shutdown_rx).await;
        });
    }

    let state = Arc::new(app::AppState {
        config,
        store,
        research,
        notifier,
        registry: Arc::clone(&registry),
    });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Periscope server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    // stop the watcher and all timers; in-flight executions finish on
    // their own detached tasks
    let _ = shutdown_tx.send(true);
    registry.uninstall_all();
    Ok(())
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
