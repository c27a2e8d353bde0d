//! Binario de pipeflow.
//!
//! `pipeflow run <fixture.json> [--workers N]` siembra el workflow, encola
//! el pipe de entrada y deja que el worker pool drene la cola.
//! `pipeflow ledger <progress-id>` imprime el ledger de un linaje
//! (requiere DATABASE_URL).
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use pipeflow::{AppConfig, AppError, ChannelQueue, Fixture, WorkerPool};
use pipeflow_core::{entry_codes, EntityStore, InMemoryEntityStore, InMemoryProgressLedger, PipeFactory,
                    PipelineError, ProgressLedger, TravelerContext};
use pipeflow_exec::{register_action_pipe, SshCliTransport, SshExecutor};
use pipeflow_persistence::{build_dev_pool_from_env, PgEntityStore, PgProgressLedger, PoolProvider};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const USAGE: &str = "pipeflow run <fixture.json> [--workers N] | pipeflow ledger <progress-id>";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

type Backends = (Arc<dyn EntityStore>, Arc<dyn ProgressLedger>);

/// Postgres si hay DATABASE_URL; si no, backends en memoria.
fn backends(cfg: &AppConfig) -> Result<Backends, AppError> {
    if cfg.database_url.is_some() {
        let pool = build_dev_pool_from_env()?;
        info!("backend: postgres");
        let store: Arc<dyn EntityStore> = Arc::new(PgEntityStore::new(PoolProvider { pool: pool.clone() }));
        let ledger: Arc<dyn ProgressLedger> = Arc::new(PgProgressLedger::new(PoolProvider { pool }));
        return Ok((store, ledger));
    }
    info!("backend: in-memory");
    let store: Arc<dyn EntityStore> = Arc::new(InMemoryEntityStore::new());
    let ledger: Arc<dyn ProgressLedger> = Arc::new(InMemoryProgressLedger::new());
    Ok((store, ledger))
}

async fn run(cfg: AppConfig, fixture_path: PathBuf) -> Result<bool, AppError> {
    let fixture = Fixture::from_path(&fixture_path).map_err(AppError::Fixture)?;
    let (store, ledger) = backends(&cfg)?;
    let (queue, mut receiver) = ChannelQueue::unbounded();

    let mut factory = PipeFactory::new(store.clone());
    let executor = SshExecutor::with_config(SshCliTransport::new(cfg.ssh.clone()), &cfg.ssh);
    register_action_pipe(&mut factory, Arc::new(executor));
    let ctx = TravelerContext::new(store.clone(), ledger.clone(), Arc::new(factory), Arc::new(queue));

    // Los backends son síncronos: la siembra va a un hilo bloqueante.
    let launch_ctx = ctx.clone();
    let progress = tokio::task::spawn_blocking(move || fixture.launch(&launch_ctx)).await??;
    info!(progress = %progress.id, "run queued");

    let report = WorkerPool::new(ctx, cfg.workers, cfg.idle_timeout).run(&mut receiver).await;
    let entries = ledger.list(progress.id)?;
    println!("progress {} -> {}", progress.id, entry_codes(&entries).join(" "));
    Ok(report.failures.is_empty())
}

fn print_ledger(progress_id: Uuid) -> Result<(), AppError> {
    let pool = build_dev_pool_from_env()?;
    let ledger = PgProgressLedger::new(PoolProvider { pool });
    let progress = ledger.load(progress_id)?;
    println!("progress {} stream {} started {}", progress.id, progress.stream_id, progress.started_at);
    for entry in ledger.list(progress_id)? {
        let kind = serde_json::to_string(&entry.kind).map_err(PipelineError::from)?;
        println!("{:>6} {} {}", entry.seq, entry.ts, kind);
    }
    Ok(())
}

fn parse_run_args(args: &[String], cfg: &mut AppConfig) -> Result<PathBuf, AppError> {
    let mut fixture = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--workers" => {
                i += 1;
                cfg.workers = args.get(i)
                                  .and_then(|v| v.parse().ok())
                                  .filter(|w: &usize| *w > 0)
                                  .ok_or_else(|| AppError::Usage("--workers espera un entero > 0".into()))?;
            }
            other => fixture = Some(PathBuf::from(other)),
        }
        i += 1;
    }
    fixture.ok_or_else(|| AppError::Usage(USAGE.into()))
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let mut cfg = AppConfig::from_env();
    let args: Vec<String> = std::env::args().collect();

    let result = match args.get(1).map(String::as_str) {
        Some("run") => match parse_run_args(&args[2..], &mut cfg) {
            Ok(path) => run(cfg, path).await,
            Err(e) => Err(e),
        },
        Some("ledger") => match args.get(2).and_then(|v| Uuid::parse_str(v).ok()) {
            Some(id) => tokio::task::spawn_blocking(move || print_ledger(id)).await
                                                                            .map_err(AppError::from)
                                                                            .and_then(|r| r.map(|_| true)),
            None => Err(AppError::Usage(USAGE.into())),
        },
        _ => Err(AppError::Usage(USAGE.into())),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("some deliveries failed, see log");
            ExitCode::from(1)
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
