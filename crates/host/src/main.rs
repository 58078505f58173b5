use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use host::{Error, Result, SqliteTools, server_info};
use mcp::Dispatcher;
use policy::Policy;
use storage::{DEFAULT_DB_PATH, RecordStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND: &str = "127.0.0.1:8000";

#[derive(Parser)]
#[command(name = "sqlite-mcp")]
#[command(about = "SQLite tool host speaking MCP", long_about = None)]
#[command(version)]
struct Cli {
    /// Transport to serve on
    #[arg(long = "server_type", alias = "server-type", value_enum, default_value_t = ServerType::Sse)]
    server_type: ServerType,

    /// Database file, created on first use
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Listen address for the SSE transport
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: SocketAddr,

    /// Statement policy file (TOML); every statement is allowed without one
    #[arg(long)]
    policy: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ServerType {
    Sse,
    Stdio,
}

#[tokio::main]
async fn main() {
    // stdout belongs to the stdio transport; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sqlite_mcp=info,host=info,mcp=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let policy = match &cli.policy {
        Some(path) => {
            info!(path = %path.display(), "loading statement policy");
            Policy::load(path)?
        }
        None => Policy::passthrough(),
    };

    let store = RecordStore::new(&cli.db);
    info!(db = %store.path().display(), transport = ?cli.server_type, "starting server");

    let dispatcher = Arc::new(Dispatcher::new(SqliteTools::new(store, policy), server_info()));

    match cli.server_type {
        ServerType::Sse => mcp::serve_sse(dispatcher, cli.bind).await,
        ServerType::Stdio => mcp::serve_stdio(dispatcher).await,
    }
    .map_err(Error::from)
}
