use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mt5_bridge_core::{native, ModuleLoader};
use mt5_bridge_server::{BridgeServer, BridgeServerConfig, Mt5BridgeService};

#[derive(Parser, Debug)]
#[command(name = "mt5-bridge", about = "gRPC bridge for the MetaTrader 5 terminal")]
struct Args {
    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8001)]
    port: u16,

    /// Worker threads serving requests
    #[arg(long, default_value_t = 10)]
    threads: usize,

    /// Verbose logging
    #[arg(short, long)]
    debug: bool,

    /// Path to the native trading module library. Falls back to the
    /// MT5_BRIDGE_MODULE environment variable, then to libmt5native.so
    /// on the library search path.
    #[arg(long)]
    module_path: Option<PathBuf>,

    /// Seconds to wait for in-flight calls on shutdown
    #[arg(long, default_value_t = 5)]
    grace_period_secs: u64,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    // Native calls block their worker thread for the duration of
    // terminal I/O, so the thread count bounds concurrent native calls.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(args.threads)
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let module_path = args.module_path.clone().unwrap_or_else(|| {
        std::env::var_os("MT5_BRIDGE_MODULE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("libmt5native.so"))
    });
    info!("native module path: {}", module_path.display());

    let loader = ModuleLoader::new(native::library_factory(module_path));
    let service = Mt5BridgeService::new(loader);

    let config = BridgeServerConfig {
        host: args.host.clone(),
        port: args.port,
        grace_period: Duration::from_secs(args.grace_period_secs),
        ..Default::default()
    };
    let server = BridgeServer::new(config, service);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(wait_for_signals(shutdown_tx));

    if let Err(e) = server.start_with_shutdown(shutdown_rx).await {
        error!("server fault: {e:#}");
        return Err(e);
    }
    info!("bridge exited cleanly");
    Ok(())
}

/// Translate SIGINT/SIGTERM into one shutdown request. Later signals
/// during the drain are logged and ignored.
#[cfg(unix)]
async fn wait_for_signals(shutdown: oneshot::Sender<()>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("cannot install SIGTERM handler: {e}");
            return;
        }
    };

    let mut shutdown = Some(shutdown);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = terminate.recv() => info!("received SIGTERM"),
        }
        match shutdown.take() {
            Some(tx) => {
                let _ = tx.send(());
            }
            None => info!("shutdown already in progress"),
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signals(shutdown: oneshot::Sender<()>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("received interrupt");
        let _ = shutdown.send(());
    }
}
