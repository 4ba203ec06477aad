use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use optfolio::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// First date of the price window (YYYY-MM-DD)
    #[arg(long, global = true)]
    start: Option<NaiveDate>,

    /// Last date of the price window (YYYY-MM-DD)
    #[arg(long, global = true)]
    end: Option<NaiveDate>,

    /// Directory containing <SYMBOL>.csv price files
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Benchmark symbol used to align trading dates
    #[arg(long, global = true)]
    benchmark: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Find the allocation with the highest Sharpe ratio
    Optimize {
        /// Symbols to allocate across; defaults to the configured list
        symbols: Vec<String>,
    },
    /// Report statistics for a given allocation
    Assess {
        /// Symbols of the allocation; defaults to the configured list
        symbols: Vec<String>,

        /// Comma-separated weights, one per symbol
        #[arg(short, long, value_delimiter = ',', required = true)]
        weights: Vec<f64>,
    },
}

impl From<Commands> for optfolio::AppCommand {
    fn from(cmd: Commands) -> optfolio::AppCommand {
        match cmd {
            Commands::Optimize { symbols } => optfolio::AppCommand::Optimize { symbols },
            Commands::Assess { symbols, weights } => {
                optfolio::AppCommand::Assess { symbols, weights }
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let overrides = optfolio::ConfigOverrides {
        start_date: cli.start,
        end_date: cli.end,
        data_path: cli.data_dir,
        benchmark: cli.benchmark,
    };

    let result = match cli.command {
        Some(Commands::Setup) => optfolio::cli::setup::setup(),
        Some(cmd) => {
            optfolio::run_command(cmd.into(), cli.config_path.as_deref(), &overrides).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
