pub mod audit_sink;
pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "safepost",
    about = "Safety-gated scheduled posting agent",
    long_about = "Run one guarded automation pass, inspect effective configuration, or check readiness.",
    after_help = "Examples:\n  safepost run --dry-run\n  safepost config\n  safepost doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a safepost.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run safety checks, discover targets, and post at most the per-run cap")]
    Run {
        #[arg(long, help = "Generate replies and audit them without posting")]
        dry_run: bool,
        #[arg(long, help = "Use the offline template generator instead of the completion API")]
        template: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, platform credentials, generation and audit readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { dry_run, template } => commands::run::run(commands::run::RunOptions {
            config_path: cli.config,
            dry_run,
            template,
        }),
        Command::Config => commands::CommandResult {
            exit_code: 0,
            output: commands::config::run(cli.config.as_deref()),
        },
        Command::Doctor { json } => commands::CommandResult {
            exit_code: 0,
            output: commands::doctor::run(cli.config.as_deref(), json),
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
