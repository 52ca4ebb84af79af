//! Command-line interface definition for Link AI
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for running the server and minting development tokens.

use clap::{Parser, Subcommand};

/// Link AI - consent-gated conversation summarization service
#[derive(Parser, Debug, Clone)]
#[command(name = "link-ai")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml", env = "LINK_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Link AI
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override the bind host from config
        #[arg(long)]
        host: Option<String>,

        /// Override the bind port from config
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Mint a development JWT signed with the configured secret
    Token {
        /// Subject (user id) of the token
        #[arg(long)]
        user_id: String,

        /// Email claim
        #[arg(long)]
        email: String,

        /// Display name claim
        #[arg(long)]
        name: String,

        /// Role claim
        #[arg(long, default_value = "user")]
        role: String,

        /// Token lifetime; defaults to auth.token_ttl_seconds
        #[arg(long)]
        ttl_seconds: Option<u64>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            command: Commands::Serve {
                host: None,
                port: None,
            },
        }
    }
}
