//! linekv server binary
//!
//! Sets up logging, the storage engine and its expiry sweeper, then serves
//! connections until Ctrl+C.

use anyhow::{bail, Context};
use linekv::server::{Server, ServerConfig};
use linekv::storage::{ExpirySweeper, StorageEngine};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Entry lifetime in seconds
    ttl_secs: u64,
    max_connections: Option<usize>,
    idle_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: linekv::DEFAULT_HOST.to_string(),
            port: linekv::DEFAULT_PORT,
            ttl_secs: linekv::DEFAULT_TTL.as_secs(),
            max_connections: None,
            idle_timeout_secs: None,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments.
    ///
    /// Returns `Ok(None)` when `--help` or `--version` was handled.
    fn from_args() -> anyhow::Result<Option<Self>> {
        let mut config = Config::default();
        let mut args = std::env::args().skip(1);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => config.host = value_for(&arg, args.next())?,
                "--port" | "-p" => {
                    config.port = value_for(&arg, args.next())?
                        .parse()
                        .context("invalid port number")?;
                }
                "--ttl" | "-t" => {
                    config.ttl_secs = value_for(&arg, args.next())?
                        .parse()
                        .context("invalid TTL")?;
                    if config.ttl_secs == 0 {
                        bail!("--ttl must be at least 1 second");
                    }
                }
                "--max-connections" => {
                    let n: usize = value_for(&arg, args.next())?
                        .parse()
                        .context("invalid connection limit")?;
                    if n == 0 {
                        bail!("--max-connections must be at least 1");
                    }
                    config.max_connections = Some(n);
                }
                "--idle-timeout" => {
                    let secs: u64 = value_for(&arg, args.next())?
                        .parse()
                        .context("invalid idle timeout")?;
                    config.idle_timeout_secs = (secs > 0).then_some(secs);
                }
                "--help" => {
                    print_help();
                    return Ok(None);
                }
                "--version" | "-v" => {
                    println!("linekv version {}", linekv::VERSION);
                    return Ok(None);
                }
                other => {
                    print_help();
                    bail!("unknown argument: {}", other);
                }
            }
        }

        Ok(Some(config))
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_address: self.bind_address(),
            ttl: Duration::from_secs(self.ttl_secs),
            max_connections: self.max_connections,
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
        }
    }
}

fn value_for(flag: &str, value: Option<String>) -> anyhow::Result<String> {
    value.with_context(|| format!("{} requires a value", flag))
}

fn print_help() {
    println!(
        r#"
linekv - A small in-memory TTL cache over a line protocol

USAGE:
    linekv [OPTIONS]

OPTIONS:
    -h, --host <HOST>              Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>              Port to listen on (default: 7070)
    -t, --ttl <SECONDS>            Lifetime of every entry (default: 60)
        --max-connections <N>      Serve at most N clients at once (default: unlimited)
        --idle-timeout <SECONDS>   Drop clients idle this long (default: never)
    -v, --version                  Print version information
        --help                     Print this help message

PROTOCOL:
    One request per line, one reply per line:
    $ nc 127.0.0.1 7070
    1 SET name Ariz
    1 OK
    2 GET name
    2 OK Ariz
    3 DEL name
    3 OK

LOGGING:
    Set RUST_LOG (e.g. RUST_LOG=linekv=debug) to change verbosity.
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(config) = Config::from_args()? else {
        return Ok(());
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let server_config = config.server_config();

    // One store for the whole process, shared by the server and the sweeper
    let storage = Arc::new(StorageEngine::new(server_config.ttl));
    info!(ttl_secs = config.ttl_secs, "Storage engine initialized");

    let sweeper = ExpirySweeper::start(Arc::clone(&storage));

    let server = Server::bind(&server_config, Arc::clone(&storage)).await?;
    let stats = server.stats();
    info!(
        "linekv v{} ready on {}",
        linekv::VERSION,
        server.local_addr()?
    );

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    let result = server.run_until(shutdown).await;

    sweeper.shutdown().await;

    let storage_stats = storage.stats();
    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        keys = storage_stats.keys,
        expired = storage_stats.expired,
        "Server shutdown complete"
    );

    result.map_err(Into::into)
}
