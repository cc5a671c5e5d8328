//! Binary crate for the `nimbus` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Rendering the canonical model in the user's display units

use clap::Parser;

mod cli;
mod display;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cmd = cli::Cli::parse();
    cmd.run().await
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nimbus=info,nimbus_core=info"));

    fmt().with_env_filter(env_filter).with_target(true).with_writer(std::io::stderr).init();
}
