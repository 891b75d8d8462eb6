use std::path::PathBuf;

use clap::Parser;

/// Rental car assistant: ask in plain words, get search results, car
/// details and bookings from the rental MCP server.
#[derive(Parser, Debug)]
#[command(name = "rentclaw", version, about)]
struct Cli {
    /// Path to config.toml (default: next to the binary, working dir, user config dir)
    #[arg(short, long, env = "RENTCLAW_CONFIG")]
    config: Option<PathBuf>,

    /// Keep earlier turns and let the classifier see them
    #[arg(long)]
    remember: bool,

    /// Classify with keyword heuristics only
    #[arg(long)]
    no_oracle: bool,

    /// Log filter when RUST_LOG is unset (e.g. "rentclaw=debug")
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,

    /// Write the effective configuration to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let opts = rentclaw::RunOptions {
        config: cli.config,
        remember: cli.remember,
        no_oracle: cli.no_oracle,
        log: cli.log,
        write_config: cli.write_config,
    };

    if let Err(e) = rentclaw::run(opts).await {
        eprintln!("rentclaw: {}", rentclaw::errors::error_chain(&e));
        std::process::exit(1);
    }
}
