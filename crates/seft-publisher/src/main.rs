//! SEFT Publisher - Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use seft_common::logging::{init_logging, LogConfig, LogLevel};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{signal, sync::watch};
use tracing::{error, info};

use seft_publisher::{
    api::{self, AppState},
    config::{Config, ScheduleMode},
    health::HealthReporter,
    ingest::HttpIngestClient,
    pipeline::CycleCoordinator,
    remote::{FtpConnector, SessionFactory},
    scheduler::Scheduler,
};

#[derive(Parser, Debug)]
#[command(name = "seft-publisher")]
#[command(author, version, about = "Publish SEFT files from FTP to the ingestion service")]
struct Cli {
    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Scheduling mode (interval, fixed_rate, once, trigger); overrides SEFT_SCHEDULE_MODE
    #[arg(long)]
    mode: Option<ScheduleMode>,

    /// Operator API port; overrides SEFT_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Logging defaults; our own crates follow the chosen level
fn default_log_config(verbose: bool) -> LogConfig {
    let level = if verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    LogConfig::builder()
        .level(level)
        .log_file_prefix("seft-publisher")
        .filter_directives("suppaftp=warn")
        .build()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Environment variables take precedence over the defaults set here
    let log_config = default_log_config(cli.verbose).merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting SEFT Publisher");

    let mut config = Config::load().context("Invalid configuration")?;
    if let Some(mode) = cli.mode {
        config.schedule.mode = mode;
    }
    if cli.once {
        config.schedule.mode = ScheduleMode::Once;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    info!(
        ftp = %config.ftp.address(),
        ingest = %config.ingest.base_url,
        mode = ?config.schedule.mode,
        "Configuration loaded"
    );

    let factory = Arc::new(SessionFactory::new(Arc::new(FtpConnector::new(
        config.ftp.clone(),
    ))));
    let endpoint = Arc::new(
        HttpIngestClient::new(config.ingest.clone()).context("Failed to build HTTP client")?,
    );

    let coordinator = Arc::new(CycleCoordinator::new(
        factory.clone(),
        endpoint.clone(),
        config.pipeline.clone(),
        config.ftp.clone(),
    ));
    let scheduler = Scheduler::new(coordinator.clone(), config.schedule.clone());

    let state = AppState {
        coordinator,
        health: HealthReporter::new(factory, endpoint, config.server.health_timeout()),
        trigger: scheduler.trigger_handle(),
    };
    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid operator API address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Operator API listening on {}", addr);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|&stop| stop).await;
            })
            .await
    });

    let once = config.schedule.mode == ScheduleMode::Once;
    let shutdown_timeout = config.server.shutdown_timeout_secs;
    let signals = tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
        shutdown_tx
    });

    let cycles = scheduler.run(shutdown_rx).await;
    info!(cycles, "Scheduler finished");

    if once {
        // Nothing else to wait for; stop the API too
        signals.abort();
    }
    let shutdown_tx = signals.await.ok();
    if let Some(tx) = &shutdown_tx {
        let _ = tx.send(true);
    }
    drop(shutdown_tx);

    match tokio::time::timeout(Duration::from_secs(shutdown_timeout), server).await {
        Ok(Ok(Ok(()))) => info!("Operator API shut down gracefully"),
        Ok(Ok(Err(e))) => error!("Operator API error: {}", e),
        Ok(Err(e)) => error!("Operator API task failed: {}", e),
        Err(_) => error!("Operator API did not stop within {}s", shutdown_timeout),
    }

    info!("SEFT Publisher stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, finishing current cycle before shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, finishing current cycle before shutdown");
        },
    }
}
