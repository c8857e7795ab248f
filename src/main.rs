use anyhow::Result;
use clap::{Parser, Subcommand};
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use std::sync::Arc;
use tokio::signal;

use swarmgate::{config, crypto, ledger::MemoryLedger, metrics, service::TrackerService};

#[derive(Parser)]
#[command(author, version, about = "swarmgate - reputation-gated announce service")]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Generate a fresh identity keypair and print the chain address
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("--- swarmgate ---");

    let cli = Cli::parse();

    if let Some(Cmd::Keygen) = cli.cmd {
        let key = SigningKey::random(&mut OsRng);
        println!("address: {}", crypto::format_address(&crypto::address_of_signer(&key)));
        println!("secret:  {}", hex::encode(key.to_bytes()));
        return Ok(());
    }

    // Try reading config from the CLI path, then the executable directory,
    // else fall back to built-in defaults.
    let cfg = match config::load(&cli.config) {
        Ok(c) => c,
        Err(e1) => {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            let candidate = exe_dir.map(|d| d.join("config.toml"));
            match candidate.as_ref().map(config::load) {
                Some(Ok(c)) => c,
                _ => {
                    eprintln!("no usable config ({}), running with defaults", e1);
                    config::Config::default()
                }
            }
        }
    };

    println!(
        "gate: min ratio {:.2}, receipt window {}s, cache ttl {}s",
        cfg.gate.min_ratio, cfg.receipts.freshness_window_secs, cfg.cache.ttl_secs
    );

    let metrics = metrics::Metrics::new()?;
    metrics::serve(cfg.metrics.clone(), metrics.clone())?;
    println!("metrics on {}", cfg.metrics.bind);

    // The binary shell wires an in-memory ledger; a deployment swaps in a
    // chain-backed Ledger implementation behind the same trait.
    let ledger = Arc::new(MemoryLedger::new());
    let service = Arc::new(TrackerService::new(&cfg, ledger).with_metrics(metrics));
    let _filter = swarmgate::callback_filter(service);
    println!("announce filter ready, ctrl-c to stop");

    signal::ctrl_c().await?;
    println!("shutting down");
    Ok(())
}
