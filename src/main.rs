//! judgehost - Application Entry Point
//!
//! Starts the judge host process: database pool, problem catalogue and
//! the judging worker pool. The embedding web layer talks to this crate
//! through [`judgehost::services`]; the binary runs the pipeline and
//! shuts it down cleanly on SIGINT.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use judgehost::catalogue::Catalogue;
use judgehost::config::CONFIG;
use judgehost::db::{self, Repository, repositories::PgRepository};
use judgehost::judge::{JudgeContext, JudgeQueue};
use judgehost::sandbox::{SandboxRunner, SystemdSandbox};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting judgehost...");

    // Initialize database connection pool
    tracing::info!("Connecting to database...");
    let pool = db::connect(&CONFIG.database).await?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // Load the problem catalogue
    let catalogue = Arc::new(Catalogue::new(CONFIG.catalogue.data_dir.clone()));
    catalogue.reload().await?;

    // Wire the pipeline
    let repo: Arc<dyn Repository> = Arc::new(PgRepository::new(pool));
    let engine: Arc<dyn SandboxRunner> = Arc::new(SystemdSandbox::new(CONFIG.sandbox.clone()));
    let queue = JudgeQueue::new(
        CONFIG.judge.worker_count,
        CONFIG.judge.queue_capacity,
        JudgeContext {
            repo,
            catalogue,
            engine,
        },
    );
    queue.start_workers();

    tracing::info!("judgehost running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    queue.stop_workers().await;

    Ok(())
}
