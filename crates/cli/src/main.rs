use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
use commands::{config::ConfigCommand, evaluate::EvaluateArgs, run::RunArgs};

#[derive(Parser)]
#[command(name = "bughunter")]
#[command(about = "Documentation-grounded bug localization for RDI test code")]
#[command(version)]
#[command(author = "BugHunter Team")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate the buggy lines of every unit in an input CSV
    Run(RunArgs),

    /// Score a predictions CSV against the labelled input
    Evaluate(EvaluateArgs),

    Config {
        #[command(subcommand)]
        subcommand: ConfigCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::run::execute(args))
        }
        Commands::Evaluate(args) => commands::evaluate::execute(args),
        Commands::Config { subcommand } => subcommand.execute(),
    }
}
