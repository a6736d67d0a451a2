#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use guessmaster::providers::{create_backend, InferenceRelay};
use guessmaster::{gateway, observability, sessions, Config, SessionCommands};

/// `GuessMaster` - 20 Questions against a local Ollama model.
#[derive(Parser, Debug)]
#[command(name = "guessmaster")]
#[command(author = "theonlyhennygod")]
#[command(version)]
#[command(about = "A 20 Questions game server backed by Ollama.", long_about = None)]
struct Cli {
    /// Directory holding config.toml (default: ~/.guessmaster)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the game server
    #[command(long_about = "\
Start the game server.

Serves the game page and its JSON endpoints. Bind address defaults \
to the values in your config file (gateway.host / gateway.port).

Examples:
  guessmaster serve                  # use config defaults
  guessmaster serve -p 8080          # listen on port 8080
  guessmaster serve --host 0.0.0.0   # bind to all interfaces
  guessmaster serve -p 0             # random available port")]
    Serve {
        /// Port to listen on (use 0 for random available port); defaults to config gateway.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to; defaults to config gateway.host
        #[arg(long)]
        host: Option<String>,
    },

    /// Check that the configured Ollama server is reachable
    Check,

    /// Inspect and reset stored game sessions
    #[command(long_about = "\
Inspect and reset stored game sessions.

Examples:
  guessmaster sessions list
  guessmaster sessions list --completed --limit 10
  guessmaster sessions show <id>
  guessmaster sessions reset <id>")]
    Sessions {
        #[command(subcommand)]
        session_command: SessionCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective configuration (file plus env overrides) as TOML
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = match cli.config_dir.as_deref() {
        Some(dir) if dir.trim().is_empty() => bail!("--config-dir cannot be empty"),
        Some(dir) => Some(PathBuf::from(dir.trim())),
        None => None,
    };

    observability::init_logging()?;

    let config = Config::load_or_init(config_dir.as_deref()).await?;

    match cli.command {
        Commands::Serve { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            if port == 0 {
                info!("Starting GuessMaster on {host} (random port)");
            } else {
                info!("Starting GuessMaster on {host}:{port}");
            }
            gateway::run_gateway(&host, port, config).await
        }

        Commands::Check => run_check(&config).await,

        Commands::Sessions { session_command } => {
            sessions::handle_session_command(session_command, &config).await
        }

        Commands::Config { config_command } => match config_command {
            ConfigCommands::Show => {
                println!("# {}", config.config_path.display());
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        },
    }
}

async fn run_check(config: &Config) -> Result<()> {
    let relay = InferenceRelay::new(create_backend(&config.ollama));
    println!("Ollama URL:  {}", relay.endpoint());
    println!("Model:       {}", relay.model());

    match relay.probe().await {
        Ok(models) => {
            println!("Status:      reachable");
            if models.is_empty() {
                println!("\nNo models installed. Pull one with: ollama pull {}", relay.model());
                return Ok(());
            }
            println!("\nAvailable models:");
            for model in &models {
                let marker = if model.name == relay.model()
                    || model.name.split(':').next() == Some(relay.model())
                {
                    " (configured)"
                } else {
                    ""
                };
                println!("  {}{marker}", model.name);
            }
            Ok(())
        }
        Err(err) => bail!("Cannot connect to Ollama: {}", err.detail()),
    }
}
