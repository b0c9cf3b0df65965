//! tle - latency and consistency harness for durable-execution orchestration
//!
//! The JSON report is written to stdout; logs and the p90 summary go to stderr.

use clap::Parser;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli.init_logging();

    if let Err(e) = cli.run().await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}
