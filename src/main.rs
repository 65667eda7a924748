//! Command-line entry point: load configuration, run one pass, report.

use autoreply::{Config, run};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "autoreply", about = "Rule-based mailbox auto-responder", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Override the rules file named in the configuration.
    #[arg(long)]
    rules: Option<PathBuf>,
    /// Render replies but skip sending, regardless of the `send_email`
    /// config.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!(
                "failed to load configuration from {}: {error}",
                cli.config.display()
            );
            return ExitCode::FAILURE;
        }
    };
    if let Some(rules) = cli.rules {
        config.rules_file = rules;
    }
    if cli.dry_run {
        config.send_email = false;
    }

    tracing_subscriber::fmt()
        .with_env_filter(config.log_filter())
        .init();

    match run(&config) {
        Ok(summary) => {
            println!(
                "{} rules, {} matched, {} replies sent, {} messages marked",
                summary.rules, summary.matched, summary.replied, summary.marked
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(%error, "run failed");
            ExitCode::FAILURE
        }
    }
}
