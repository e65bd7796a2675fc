//! `cortex-slash` - render Cortex slash commands from a terminal.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cortex_slash_cli::cli::{Cli, dispatch_command, exit_code};

fn init_logging(cli: &Cli) {
    let level = cli.log_level().as_filter_str();

    // RUST_LOG wins unless a verbosity flag was given.
    let filter = if cli.verbose || cli.trace {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = dispatch_command(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}
