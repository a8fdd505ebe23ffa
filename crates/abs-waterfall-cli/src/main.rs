mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::irr::IrrArgs;
use commands::scenarios::ScenariosArgs;
use commands::simulate::SimulateArgs;

/// CLO/CMBS cash-flow waterfall simulation
#[derive(Parser)]
#[command(
    name = "abs-waterfall",
    version,
    about = "CLO/CMBS cash-flow waterfall simulation",
    long_about = "Simulates monthly collateral cash through a senior / mezzanine / equity \
                  waterfall with decimal precision. Reports the monthly ledger, annual \
                  roll-ups, per-tranche IRRs and stress-scenario comparisons."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a deal through the monthly waterfall
    Simulate(SimulateArgs),
    /// Run a deal and report annual summaries with annual IRRs
    Annual(SimulateArgs),
    /// Annualised IRR of an arbitrary cash-flow vector
    Irr(IrrArgs),
    /// Compare stress scenarios over one capital structure
    Scenarios(ScenariosArgs),
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
    let default = if verbose {
        "abs_waterfall_core=debug,abs_waterfall=debug"
    } else {
        "abs_waterfall_core=warn,abs_waterfall=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stdout carries the report; logs go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Simulate(args) => commands::simulate::run_simulate(args),
        Commands::Annual(args) => commands::simulate::run_annual(args),
        Commands::Irr(args) => commands::irr::run_irr(args),
        Commands::Scenarios(args) => commands::scenarios::run_scenarios(args),
        Commands::Version => {
            println!("abs-waterfall {}", env!("CARGO_PKG_VERSION"));
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
