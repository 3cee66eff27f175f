//! CLI module for Conduit
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `serve` - Start the HTTP server
//! - `providers` - List configured providers
//! - `capabilities` - List declared capabilities
//! - `submit` - Run one capability request in-process
//! - `config` - Configuration utilities (init, validate)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Start server with default config
//! conduit serve
//!
//! # Classify a message using the configured providers
//! conduit submit text_classification --text "I want a refund" --max-cost 0.5
//!
//! # Generate shell completions
//! conduit completions bash > ~/.bash_completion.d/conduit
//! ```

pub mod capabilities;
pub mod completions;
pub mod config;
pub mod output;
pub mod providers;
pub mod serve;
pub mod submit;

pub use completions::handle_completions;
pub use config::{handle_config_init, handle_config_validate};

use crate::config::ConduitConfig;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const DEFAULT_CONFIG: &str = "conduit.toml";

/// Conduit - Multi-provider AI capability orchestrator
#[derive(Parser, Debug)]
#[command(
    name = "conduit",
    version,
    about = "Cost and latency aware routing of AI capability calls across providers"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the Conduit server
    Serve(ServeArgs),
    /// List configured providers
    Providers(ProvidersArgs),
    /// List declared capabilities
    Capabilities(CapabilitiesArgs),
    /// Submit one capability request and print the result
    Submit(SubmitArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "CONDUIT_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "CONDUIT_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CONDUIT_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProvidersArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Only providers serving this capability
    #[arg(long)]
    pub capability: Option<String>,

    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct CapabilitiesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Capability to invoke
    pub capability: String,

    /// Inline text payload
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub text: Option<String>,

    /// Read the payload from a file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Payload content type (defaults to text/plain for --text, application/octet-stream for --file)
    #[arg(long)]
    pub content_type: Option<String>,

    /// Maximum estimated cost of the chosen provider
    #[arg(long)]
    pub max_cost: Option<f64>,

    /// Per-attempt latency limit in milliseconds
    #[arg(long)]
    pub max_latency_ms: Option<u64>,

    /// Language every candidate must support (ISO code)
    #[arg(long)]
    pub language: Option<String>,

    /// Overall deadline in milliseconds
    #[arg(long)]
    pub deadline_ms: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
    /// Load and validate a configuration file
    Validate(ConfigValidateArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ConfigValidateArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Load a configuration file, apply env overrides and validate it.
pub fn load_config(path: &Path) -> Result<ConduitConfig, Box<dyn std::error::Error>> {
    let config = ConduitConfig::load(Some(path))?.with_env_overrides();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["conduit", "serve"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.config, PathBuf::from("conduit.toml"));
                assert!(args.port.is_none());
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_serve_with_port() {
        let cli = Cli::try_parse_from(["conduit", "serve", "-p", "9000"]).unwrap();
        match cli.command {
            Commands::Serve(args) => assert_eq!(args.port, Some(9000)),
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_providers_json() {
        let cli = Cli::try_parse_from(["conduit", "providers", "--json"]).unwrap();
        match cli.command {
            Commands::Providers(args) => assert!(args.json),
            _ => panic!("Expected Providers command"),
        }
    }

    #[test]
    fn test_cli_parse_submit() {
        let cli = Cli::try_parse_from([
            "conduit",
            "submit",
            "text_classification",
            "--text",
            "refund please",
            "--max-cost",
            "0.5",
            "--language",
            "en",
        ])
        .unwrap();
        match cli.command {
            Commands::Submit(args) => {
                assert_eq!(args.capability, "text_classification");
                assert_eq!(args.text.as_deref(), Some("refund please"));
                assert_eq!(args.max_cost, Some(0.5));
                assert_eq!(args.language.as_deref(), Some("en"));
            }
            _ => panic!("Expected Submit command"),
        }
    }

    #[test]
    fn test_cli_submit_requires_payload() {
        assert!(Cli::try_parse_from(["conduit", "submit", "text_classification"]).is_err());
    }

    #[test]
    fn test_cli_submit_text_and_file_conflict() {
        let result = Cli::try_parse_from([
            "conduit",
            "submit",
            "speech_to_text",
            "--text",
            "x",
            "--file",
            "a.wav",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_config_validate() {
        let cli = Cli::try_parse_from(["conduit", "config", "validate", "-c", "x.toml"]).unwrap();
        match cli.command {
            Commands::Config(ConfigCommands::Validate(args)) => {
                assert_eq!(args.config, PathBuf::from("x.toml"))
            }
            _ => panic!("Expected Config Validate command"),
        }
    }
}
