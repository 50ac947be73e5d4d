use agent_resilience::{
    config::Config,
    events::{EventSubscriber, ResilienceEvent},
    manager::ErrorHandlingManager,
    persistence::ResilientStore,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Supervisor process for the agent resilience layer
#[derive(Debug, Parser)]
#[command(name = "resilience-supervisor", version, about)]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, env = "AGENT_RESILIENCE_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `persistence.data_dir`
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

/// Logs the events an external supervisor has to act on
struct SupervisorLog;

impl EventSubscriber for SupervisorLog {
    fn on_event(&self, event: &ResilienceEvent) {
        match event {
            ResilienceEvent::Restart {
                component,
                reason,
                correlation_id,
                ..
            } => {
                tracing::warn!(component = %component, reason = %reason, correlation_id = %correlation_id, "Restart requested");
            }
            ResilienceEvent::ManualIntervention { record, reason } => {
                tracing::error!(
                    component = %record.component,
                    operation = %record.operation,
                    correlation_id = %record.correlation_id,
                    reason = %reason,
                    "Manual intervention required"
                );
            }
            ResilienceEvent::HealthStatusChange { current, .. } => {
                tracing::info!(
                    healthy = current.healthy,
                    error_rate = current.error_rate,
                    "Health status changed"
                );
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.persistence.data_dir = dir;
    }
    let json_logs = cli.json_logs || config.observability.json_logs;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting resilience supervisor v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = agent_resilience::metrics::init_metrics(prometheus::default_registry()) {
        tracing::warn!("Failed to initialize metrics: {}", e);
    }

    let manager = Arc::new(ErrorHandlingManager::new(config.manager_config())?);
    manager.subscribe(Arc::new(SupervisorLog));

    let store = ResilientStore::open(config.store_config(), manager.clone()).await;
    if store.is_degraded() {
        tracing::warn!(limitations = ?store.limitations(), "Store running in degraded mode");
    } else {
        tracing::info!(path = ?config.store_config().data_dir, "Store opened");
    }

    manager.start_health_monitoring();
    store.start_maintenance();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    store.stop_maintenance().await;
    for stats in manager.breakers().all_stats() {
        tracing::info!(
            name = %stats.name,
            state = %stats.state,
            total = stats.counters.total_requests,
            failed = stats.counters.failed_requests,
            rejected = stats.counters.rejected_requests,
            "Circuit breaker summary"
        );
    }
    manager.shutdown().await;

    tracing::info!("Shutting down gracefully...");
    Ok(())
}
