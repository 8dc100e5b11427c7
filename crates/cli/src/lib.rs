pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "wayfarer",
    about = "Wayfarer operator CLI",
    long_about = "Operate Wayfarer database migrations, demo data seeding, config inspection, and readiness checks.",
    after_help = "Examples:\n  wayfarer migrate\n  wayfarer seed\n  wayfarer doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    #[command(about = "Bring the database schema up to date")]
    Migrate,
    #[command(about = "Load a small demo book of business (safe to re-run)")]
    Seed,
    #[command(about = "Show effective configuration and where each value came from")]
    Config,
    #[command(about = "Validate config, delivery provider readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
}

impl Action {
    fn execute(self) -> CommandResult {
        match self {
            Action::Migrate => commands::migrate::run(),
            Action::Seed => commands::seed::run(),
            Action::Config => CommandResult { exit_code: 0, output: commands::config::run() },
            Action::Doctor { json } => {
                CommandResult { exit_code: 0, output: commands::doctor::run(json) }
            }
        }
    }
}

pub fn run() -> ExitCode {
    let result = Cli::parse().action.execute();

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
