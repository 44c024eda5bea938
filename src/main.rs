//! Modelyard - main entry point

use clap::Parser;
use modelyard::cli::{run, Cli};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modelyard=info".into()),
        )
        .init();

    run(Cli::parse())
}
