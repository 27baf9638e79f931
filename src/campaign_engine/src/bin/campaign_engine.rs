use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use call_placer::providers::mock::MockPlacer;
use call_placer::providers::CallPlacer;
use campaign_engine::config::EngineConfig;
use campaign_engine::db::{connection, migrate};
use campaign_engine::dispatch::DispatchQueue;
use campaign_engine::gate::Gate;
use campaign_engine::gateway::repo::SqliteGateway;
use campaign_engine::gateway::StoreGateway;
use campaign_engine::ratelimit::RateLimiter;
use campaign_engine::scheduler::{self, SchedulerParams};
use campaign_engine::status;
use campaign_engine::worker::{WorkerEnv, WorkerPool};
use shared_utils::config::get_env_var;

#[derive(Parser)]
#[command(version, about = "Outbound call campaign engine")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply embedded database migrations and exit.
    Migrate,
    /// Run the scheduler loop and worker pool until SIGTERM/SIGINT.
    Run,
    /// Print the derived status of a campaign.
    Status {
        /// Campaign id (UUID).
        #[arg(long, value_name = "UUID")]
        campaign_id: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Migrate => {
            let url = get_env_var("DATABASE_URL")?;
            migrate::run(&url)?;
            info!("migrations applied");
            Ok(())
        }
        Cmd::Status { campaign_id } => {
            let url = get_env_var("DATABASE_URL")?;
            let mut conn = connection::connect_sqlite(&url)?;
            let derived = status::campaign_status(&mut conn, &campaign_id)?;
            let counts = SqliteGateway::new().aggregate_status(&mut conn, &campaign_id)?;
            println!(
                "{derived} (pending={} in-progress={} completed={} failed={})",
                counts.pending, counts.in_progress, counts.completed, counts.failed
            );
            Ok(())
        }
        Cmd::Run => run_engine(),
    }
}

fn run_engine() -> Result<()> {
    let cfg = EngineConfig::from_env()?;
    migrate::run(&cfg.database_url)?;

    let queue = Arc::new(DispatchQueue::open(
        &cfg.queue_dir,
        cfg.dispatch_max_retries,
        cfg.dispatch_retry_delay,
    )?);
    let gate = Arc::new(Gate::new());
    let limiter = Arc::new(RateLimiter::per_minute(cfg.calls_per_minute));
    let placer: Arc<dyn CallPlacer> = Arc::new(MockPlacer::new());

    let env = Arc::new(WorkerEnv {
        queue: Arc::clone(&queue),
        gate,
        limiter,
        placer,
        placer_deadline: cfg.placer_deadline,
        database_url: cfg.database_url.clone(),
    });
    let pool = WorkerPool::spawn(cfg.worker_count, env)?;

    let sched = scheduler::spawn(
        SchedulerParams {
            period: cfg.scheduler_period,
            batch_size: cfg.claim_batch_size,
            horizon: cfg.claim_horizon(),
            orphan_threshold: cfg.orphan_threshold(),
            database_url: cfg.database_url.clone(),
        },
        Arc::clone(&queue),
    )?;

    wait_for_signal()?;

    info!("shutdown requested; stopping scheduler");
    sched.shutdown();
    info!("draining workers");
    queue.close();
    pool.shutdown(cfg.shutdown_grace);
    info!("engine stopped");
    Ok(())
}

/// Block until SIGTERM or SIGINT arrives.
fn wait_for_signal() -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(async {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = signal(SignalKind::terminate())?;
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT"),
                _ = sigterm.recv() => info!("received SIGTERM"),
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await?;
            info!("received Ctrl+C");
        }

        Ok::<(), anyhow::Error>(())
    })
}
