//! Command-line client for linekv.
//!
//! ```text
//! linekv-cli [--addr HOST:PORT] set <key> <value...>
//! linekv-cli [--addr HOST:PORT] get <key>
//! linekv-cli [--addr HOST:PORT] del <key>
//! ```
//!
//! Sends one request and prints the server's reply line.

use anyhow::{bail, Context};
use linekv::client::Client;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn usage() -> &'static str {
    "usage: linekv-cli [--addr HOST:PORT] <set KEY VALUE... | get KEY | del KEY>"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let mut addr = format!("{}:{}", linekv::DEFAULT_HOST, linekv::DEFAULT_PORT);
    if args.first().map(String::as_str) == Some("--addr") {
        if args.len() < 2 {
            bail!("--addr requires a value\n{}", usage());
        }
        addr = args.remove(1);
        args.remove(0);
    }

    let (verb, rest) = match args.split_first() {
        Some((verb, rest)) => (verb.to_lowercase(), rest),
        None => bail!("{}", usage()),
    };

    let mut client = Client::connect(addr.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let response = match (verb.as_str(), rest) {
        ("set", [key, value @ ..]) if !value.is_empty() => {
            client.set(key, &value.join(" ")).await?
        }
        ("get", [key]) => client.get(key).await?,
        ("del", [key]) => client.delete(key).await?,
        _ => bail!("{}", usage()),
    };

    println!("{}", response);
    client.close().await?;

    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}
