//! minirag binary.
//!
//! Run with: cargo run -p minirag-cli -- ask "What is discussed?" --file report.pdf

use clap::Parser;
use minirag_cli::{Cli, init_tracing, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.options.verbose);

    run(cli).await
}
