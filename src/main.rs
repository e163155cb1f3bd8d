//! chatstream - Streaming client for an AI agent chat service
//!
#![doc = "chatstream - Streaming client for an AI agent chat service"]
#![doc = "Main entry point for the chatstream CLI."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatstream::cli::{Cli, Commands};
use chatstream::commands;
use chatstream::commands::chat::ChatOptions;
use chatstream::config::{Config, LoggingConfig};
use chatstream::transport::HttpTransport;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration; logging settings come from it
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    init_tracing(&config.logging);
    tracing::debug!("Loaded configuration from {}", config_path);

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat {
            message,
            session,
            deep_think,
            attachments,
            json,
        } => {
            if let Some(s) = &session {
                tracing::debug!("Continuing session: {}", s);
            }
            let transport = HttpTransport::new(&config.server)?;
            let store = commands::open_store(&config.storage)?;
            let options = ChatOptions {
                message,
                session,
                deep_think,
                attachments,
                json,
            };
            commands::chat::run_chat(config, options, &transport, &store).await?;
            Ok(())
        }
        Commands::Sessions { command } => {
            tracing::info!("Starting session command");
            let transport = HttpTransport::new(&config.server)?;
            let store = commands::open_store(&config.storage)?;
            commands::sessions::handle_sessions(command, &store, &transport).await?;
            Ok(())
        }
        Commands::Replay { file, json } => {
            tracing::info!("Replaying transcript {}", file.display());
            commands::replay::run_replay(&config, &file, json).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr so JSON
/// command output stays parseable.
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chatstream={}", logging.level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
