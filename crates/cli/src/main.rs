//! Advisor CLI, the main entry point.
//!
//! Commands:
//! - `serve`        Start the HTTP gateway
//! - `ask`          Run one question through the pipeline
//! - `config show`  Print the effective configuration, secrets redacted
//! - `config check` Validate the configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "advisor", about = "Compliance advisor pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(long, global = true, env = "ADVISOR_CONFIG", default_value = advisor_config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask one question and print the answer
    Ask {
        question: String,

        /// Caller identity recorded in the turn log
        #[arg(long, default_value = "cli")]
        user_id: String,

        /// Print the full pipeline result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with secrets redacted
    Show,
    /// Validate the configuration and summarize it
    Check,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Serve { port } => commands::serve::run(&cli.config, port).await?,
        Commands::Ask { question, user_id, json } => {
            commands::ask::run(&cli.config, &question, &user_id, json).await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&cli.config)?,
            ConfigAction::Check => commands::config_cmd::check(&cli.config)?,
        },
    }

    Ok(())
}
