use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use splitcalc::config::{self, Config, SpawnFailurePolicy, DEFAULT_PORT};
use splitcalc::dispatcher::WorkerCommand;
use splitcalc::server;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// The address to listen on
    #[arg(short = 'l', long, env = "SPLITCALC_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// The port to listen on
    #[arg(short, long, env = "SPLITCALC_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Longest request line accepted before the client is disconnected
    #[arg(long, env = "SPLITCALC_MAX_LINE_LENGTH", default_value_t = 1024)]
    max_line_length: usize,

    /// Worker executable [default: splitcalc-worker next to this binary]
    #[arg(short, long, env = "SPLITCALC_WORKER")]
    worker: Option<PathBuf>,

    /// What to do when a worker process cannot be started
    #[arg(long, env = "SPLITCALC_ON_SPAWN_FAILURE", value_enum, default_value_t)]
    on_spawn_failure: SpawnFailurePolicy,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> splitcalc::Result<()> {
    let args = Args::parse();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    let worker = match args.worker {
        Some(path) => path,
        None => config::default_worker_path()?,
    };

    let config = Config {
        host: args.host,
        port: args.port,
        max_line_length: args.max_line_length,
        worker: WorkerCommand::new(worker),
        on_spawn_failure: args.on_spawn_failure,
    };

    server::run(config).await
}
