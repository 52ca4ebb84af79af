//! Link AI - consent-gated conversation summarization service
//!
#![doc = "Main entry point for the Link AI server."]

use anyhow::Result;

use link_ai::auth::{AuthenticatedUser, JwtValidator};
use link_ai::cli::{Cli, Commands};
use link_ai::config::Config;
use link_ai::logging::init_logging;
use link_ai::server;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    init_logging(&config.logging)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("Starting Link AI server");
            server::run(config).await?;
            Ok(())
        }
        Commands::Token {
            user_id,
            email,
            name,
            role,
            ttl_seconds,
        } => {
            let validator = JwtValidator::from_config(&config.auth);
            let user = AuthenticatedUser {
                user_id,
                email,
                display_name: name,
                role,
            };
            let token = validator.issue(&user, ttl_seconds)?;
            tracing::debug!(user_id = %user.user_id, "Issued development token");
            println!("{}", token);
            Ok(())
        }
    }
}
