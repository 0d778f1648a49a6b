//! notary-server: uniqueness checking for notarised transactions
//!
//! Main entry point that wires all crates together. Request batches are
//! read from stdin, one JSON array per line, and answered on stdout with
//! one JSON line per batch.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use tracing_subscriber::{EnvFilter, fmt};

use notary_core::SystemClock;
use notary_core::config::{AppConfig, BackingStoreKind, LogFormat};
use notary_core::error::{AppError, ErrorKind};
use notary_core::traits::BackingStore;
use notary_database::migration::run_migrations;
use notary_database::{DatabasePool, PostgresBackingStore};
use notary_entity::{
    HoldingIdentity, SecureHash, UniquenessCheckRequest, UniquenessCheckResult,
};
use notary_memory::InMemoryBackingStore;
use notary_service::UniquenessChecker;
use notary_worker::jobs::CacheMaintenanceJob;
use notary_worker::queue::BatchOutcome;
use notary_worker::{BatchExecutor, BatchQueue, CronScheduler, WorkerRunner};

/// How long shutdown waits for background work
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "notary-server", version, about = "Notary uniqueness checker")]
struct Args {
    /// Configuration overlay loaded from `config/{env}.toml`
    #[arg(long, env = "NOTARY_ENV", default_value = "development")]
    env: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::load(&args.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // stdout carries results, so logs go to stderr
    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

/// Where intake sends batches
#[derive(Debug, Clone)]
enum Intake {
    /// Through the worker pool
    Queue(BatchQueue),
    /// Straight to the checker
    Direct(Arc<UniquenessChecker>),
}

impl Intake {
    async fn process(&self, requests: Vec<UniquenessCheckRequest>) -> BatchOutcome {
        match self {
            Self::Queue(queue) => queue.process(requests).await,
            Self::Direct(checker) => checker.process(requests).await,
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting notary-server v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Backing store ────────────────────────────────────
    let mut db_pool = None;
    let store: Arc<dyn BackingStore> = match config.backing_store.kind {
        BackingStoreKind::Postgres => {
            let pool = DatabasePool::connect(&config.database).await?;
            if config.backing_store.run_migrations {
                run_migrations(pool.pool()).await?;
            }
            db_pool = Some(pool.clone());
            Arc::new(PostgresBackingStore::new(
                pool,
                config.database.lock_timeout_ms,
            ))
        }
        BackingStoreKind::Memory => {
            tracing::warn!("Using the in-memory backing store; outcomes are not durable");
            Arc::new(InMemoryBackingStore::new())
        }
    };

    // ── Step 2: Uniqueness checker ───────────────────────────────
    let checker = Arc::new(UniquenessChecker::new(
        store,
        Arc::new(SystemClock),
        &config.checker,
    ));
    checker.start().await?;

    // ── Step 3: Worker pool ──────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (intake, worker_handle) = if config.worker.enabled {
        let (queue, receiver) = BatchQueue::new(config.worker.queue_capacity);
        let executor = Arc::new(BatchExecutor::new(checker.clone()));
        let runner = WorkerRunner::new(
            receiver,
            executor,
            config.worker.clone(),
            format!("notary-worker-{}", std::process::id()),
        );
        let handle = tokio::spawn(runner.run(shutdown_rx));
        (Intake::Queue(queue), Some(handle))
    } else {
        tracing::info!("Worker pool disabled; processing batches inline");
        (Intake::Direct(Arc::clone(&checker)), None)
    };

    // ── Step 4: Scheduled maintenance ────────────────────────────
    let mut scheduler = CronScheduler::new().await?;
    scheduler
        .register_cache_maintenance(
            &config.worker.cache_maintenance_cron,
            CacheMaintenanceJob::new(Arc::clone(&checker)),
        )
        .await?;
    scheduler.start().await?;

    // ── Step 5: Batch intake ─────────────────────────────────────
    tracing::info!("Reading request batches from stdin");
    let in_flight = serve_stdin(intake).await;

    // ── Step 6: Graceful shutdown ────────────────────────────────
    tracing::info!(
        "Waiting for {} in-flight batch(es) to complete...",
        in_flight.len()
    );
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, in_flight.join_all())
        .await
        .is_err()
    {
        tracing::warn!("Timed out waiting for in-flight batches");
    }

    let _ = shutdown_tx.send(true);
    if let Some(handle) = worker_handle {
        let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await;
    }
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Scheduler shutdown failed: {}", e);
    }
    checker.stop();
    if let Some(pool) = db_pool {
        pool.close().await;
    }

    tracing::info!("notary-server shut down gracefully");
    Ok(())
}

/// One result in a batch response
#[derive(Debug, Serialize)]
struct ResultLine<'a> {
    holding_identity: &'a HoldingIdentity,
    tx_id: &'a SecureHash,
    result: &'a UniquenessCheckResult,
}

/// A failed batch
#[derive(Debug, Serialize)]
struct ErrorLine {
    kind: ErrorKind,
    message: String,
}

/// The line written for one input line
#[derive(Debug, Serialize)]
struct BatchResponse<'a> {
    /// 1-based input line number
    batch: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<Vec<ResultLine<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorLine>,
}

/// Read batches until EOF or a shutdown signal, returning the tasks still
/// answering them.
async fn serve_stdin(intake: Intake) -> JoinSet<()> {
    let stdout = Arc::new(Mutex::new(tokio::io::stdout()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = JoinSet::new();
    let mut batch = 0u64;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, starting graceful shutdown...");
                break;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("stdin closed");
                break;
            }
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        batch += 1;

        let intake = intake.clone();
        let stdout = Arc::clone(&stdout);
        in_flight.spawn(async move {
            let outcome = match serde_json::from_str::<Vec<UniquenessCheckRequest>>(&line) {
                Ok(requests) => intake.process(requests).await,
                Err(e) => Err(AppError::from(e)),
            };
            let rendered = render(batch, &outcome);
            let mut out = stdout.lock().await;
            if let Err(e) = out.write_all(rendered.as_bytes()).await {
                tracing::error!(batch, "Failed to write response: {}", e);
            }
            let _ = out.flush().await;
        });

        // Reap finished tasks so the set does not grow without bound
        while in_flight.try_join_next().is_some() {}
    }

    in_flight
}

fn render(batch: u64, outcome: &BatchOutcome) -> String {
    let response = match outcome {
        Ok(results) => BatchResponse {
            batch,
            results: Some(
                results
                    .iter()
                    .map(|(request, result)| ResultLine {
                        holding_identity: &request.holding_identity,
                        tx_id: &request.tx_id,
                        result,
                    })
                    .collect(),
            ),
            error: None,
        },
        Err(e) => BatchResponse {
            batch,
            results: None,
            error: Some(ErrorLine {
                kind: e.kind,
                message: e.message.clone(),
            }),
        },
    };

    match serde_json::to_string(&response) {
        Ok(mut json) => {
            json.push('\n');
            json
        }
        Err(e) => format!(
            "{{\"batch\":{batch},\"error\":{{\"kind\":\"Serialization\",\"message\":{:?}}}}}\n",
            e.to_string()
        ),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
