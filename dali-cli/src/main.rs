//! Dali CLI
//!
//! Serves synthetic payloads of configured sizes over HTTP, and inspects
//! the configuration and buffer layouts behind them.

mod commands;
mod error;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use commands::serve::ServeOptions;
use dali_core::logging::{LogFormat, LogLevel};
use dali_core::{PatternRounding, Strategy};
use error::CliResult;
use std::path::PathBuf;
use std::process;

/// Dali - synthetic payload HTTP server
#[derive(Parser)]
#[command(name = "dali")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(about = "Serve exact-length synthetic HTTP payloads for load testing", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Debug-level logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the payload server
    Serve(ServeArgs),

    /// Validate a configuration file and print its routes
    Check(CheckArgs),

    /// Show the buffer layout for a size and strategy
    Plan(PlanArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Configuration file (.toml or .json)
    #[arg(short, long, env = "DALI_CONFIG")]
    config: Option<PathBuf>,

    /// .env file to load before reading DALI_* variables
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8080
    #[arg(short, long)]
    listen: Option<String>,

    /// Root payload size, e.g. 500, 64k, 1g
    #[arg(short, long)]
    size: Option<String>,

    /// Root payload strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Log line format
    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,
}

#[derive(Args)]
struct CheckArgs {
    /// Configuration file (.toml or .json)
    #[arg(short, long)]
    config: PathBuf,
}

#[derive(Args)]
struct PlanArgs {
    /// Payload size, e.g. 500, 64k, 1g
    #[arg(short, long)]
    size: String,

    #[arg(long, value_enum, default_value = "zero")]
    strategy: StrategyArg,

    /// Emit exactly the requested length for pattern payloads
    #[arg(long)]
    exact: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Pattern,
    Zero,
    Instrumented,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Pattern => Strategy::Pattern,
            StrategyArg::Zero => Strategy::Zero,
            StrategyArg::Instrumented => Strategy::Instrumented,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Json,
    Plain,
    Pretty,
    Compact,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Plain => LogFormat::Plain,
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let log_level = if cli.verbose {
        Some(LogLevel::Debug)
    } else if cli.quiet {
        Some(LogLevel::Error)
    } else {
        None
    };

    let result: CliResult<()> = match cli.command {
        Commands::Serve(args) => {
            commands::serve::execute(ServeOptions {
                config: args.config,
                env_file: args.env_file,
                listen: args.listen,
                size: args.size,
                strategy: args.strategy.map(Strategy::from),
                log_format: args.log_format.map(LogFormat::from),
                log_level,
                colors: !cli.no_color,
            })
            .await
        }
        Commands::Check(args) => commands::check::execute(&args.config),
        Commands::Plan(args) => {
            let rounding = if args.exact {
                PatternRounding::Exact
            } else {
                PatternRounding::Quantum
            };
            commands::plan::execute(&args.size, args.strategy.into(), rounding)
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
