mod commands;
mod input;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::analytics::{
    CumulativeArgs, FrequencyArgs, MetricsArgs, NormalizeArgs, PortfolioReturnsArgs,
};
use commands::optimization::OptimizeArgs;

/// Return-series analytics and turnover-bounded portfolio optimization
#[derive(Parser)]
#[command(
    name = "pfa",
    version,
    about = "Return-series analytics and turnover-bounded portfolio optimization",
    long_about = "A CLI for analysing periodic percentage return series and improving \
                  portfolio weights. Supports frequency detection, risk/return metrics, \
                  weighted portfolio returns, weight normalization, and local-search \
                  optimization under a per-asset turnover limit."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log search progress to stderr (same as PFA_LOG=portfolio_analytics_core=debug)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the sampling frequency of a return series
    Frequency(FrequencyArgs),
    /// Return, risk, tail, and benchmark metrics for a return series
    Metrics(MetricsArgs),
    /// Weighted portfolio returns from per-asset series
    PortfolioReturns(PortfolioReturnsArgs),
    /// Chain periodic returns into cumulative returns
    Cumulative(CumulativeArgs),
    /// Rescale weights to total exactly 100 at one decimal
    Normalize(NormalizeArgs),
    /// Improve weights for an objective within a turnover limit
    Optimize(OptimizeArgs),
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

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Frequency(args) => commands::analytics::run_frequency(args),
        Commands::Metrics(args) => commands::analytics::run_metrics(args),
        Commands::PortfolioReturns(args) => commands::analytics::run_portfolio_returns(args),
        Commands::Cumulative(args) => commands::analytics::run_cumulative(args),
        Commands::Normalize(args) => commands::analytics::run_normalize(args),
        Commands::Optimize(args) => commands::optimization::run_optimize(args),
        Commands::Version => {
            println!("pfa {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
