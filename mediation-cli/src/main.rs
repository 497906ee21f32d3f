//! Mediation CLI - Command-line interface
//!
//! Runs ad waterfalls against sandbox and feed networks and prints the
//! resulting insight, and manages the configuration file.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use mediation::config::ConfigFile;
use mediation::logging::init_logging;

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "mediation", version, about = "Native ad mediation waterfall runner")]
struct Cli {
    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a waterfall against the given rules and print the insight
    Simulate(SimulateArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Config(command) => commands::config::run(command),
        Commands::Simulate(args) => {
            let config = ConfigFile::load()?;

            let mut logging = config.to_logging_config();
            if let Some(level) = cli.log_level {
                logging.level = level;
            }
            // Held until exit so buffered file output is flushed.
            let _guard = init_logging(&logging)?;

            commands::simulate::run(args, config)
        }
    }
}
