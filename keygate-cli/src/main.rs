//! Keygate license command line
//!
//! Drives the license engine from a shell or a deployment script:
//!
//!   keygate --host https://licensing.example activate --key ABCD-1234
//!   keygate validate
//!   keygate status
//!
//! License state is kept under the per-user data directory unless
//! `--store` points elsewhere.

use anyhow::Result;
use clap::Parser;
use keygate_cli::{run, Cli};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut licensing = cli.licensing()?;
    let output = run(&mut licensing, cli.command.clone()).await?;
    println!("{output}");
    Ok(())
}
