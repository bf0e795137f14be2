//! Tally demo CLI
//!
//! Runs small handle scenarios against the process-wide registries and
//! prints the registry listing after each step.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Reference-counted handles with sweep collection", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a handle scenario and show the registry after each step
    Demo {
        /// Scenario to run
        #[arg(value_enum)]
        scenario: Scenario,
    },

    /// Display effective collector options and environment
    Info,
}

/// Built-in scenarios
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Scenario {
    /// Copy a handle, then drop both copies
    Copy,
    /// Track a 5-element array and walk it
    Array,
    /// Reassign a handle to an address tracked by another
    Reassign,
    /// Build a chain of handles and drop its head
    Nested,
    /// Leave a handle alive for the exit hook to drain
    Exit,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo { scenario } => commands::demo::execute(scenario),
        Commands::Info => commands::info::execute(),
    }
}
