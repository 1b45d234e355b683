mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::allocate::AllocateArgs;
use commands::optimize::OptimizeArgs;
use commands::stats::StatsArgs;
use markowitz_core::{MarkowitzError, INFEASIBILITY_GUIDANCE};

/// Constrained minimum-variance portfolio allocation
#[derive(Parser)]
#[command(
    name = "mvo",
    version,
    about = "Constrained minimum-variance portfolio allocation",
    long_about = "A CLI for Markowitz minimum-variance allocation across stocks and \
                  cryptocurrencies with decimal reporting. Supports a target return, \
                  per-asset weight bounds, short selling and category minimums."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log solver progress to stderr (same as RUST_LOG=debug)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize a full request (JSON/YAML file or stdin)
    Optimize(OptimizeArgs),
    /// Allocate across stocks and cryptos from a CSV of closing prices
    Allocate(AllocateArgs),
    /// Annualized expected returns and covariance from a CSV of closing prices
    Stats(StatsArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Optimize(args) => commands::optimize::run_optimize(args),
        Commands::Allocate(args) => commands::allocate::run_allocate(args),
        Commands::Stats(args) => commands::stats::run_stats(args),
        Commands::Version => {
            println!("mvo {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            if e
                .downcast_ref::<MarkowitzError>()
                .is_some_and(MarkowitzError::suggests_relaxation)
            {
                eprintln!("{}", INFEASIBILITY_GUIDANCE.yellow());
            }
            process::exit(1);
        }
    }
}
