use clap::{Parser, Subcommand};
use std::path::PathBuf;

use feedback_types::IngestConfig;

#[derive(Parser)]
#[command(
    name = "feedback-server",
    about = "Feedback ingestion endpoint",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "FEEDBACK_CONFIG", help = "Path to JSON config file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, env = "FEEDBACK_PORT")]
    pub port: Option<u16>,

    #[arg(short, long, env = "FEEDBACK_BIND", help = "Address to bind (default 127.0.0.1)")]
    pub bind: Option<String>,

    #[arg(long, env = "DATABASE_URL", help = "PostgreSQL URL; in-memory store when unset")]
    pub database_url: Option<String>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the ingestion server (default if no command specified)")]
    Serve,

    #[command(about = "Print the stored digest of an API key")]
    HashKey {
        #[arg(help = "Raw API key")]
        key: String,
    },
}

impl Cli {
    /// Flags and env win over the config file.
    pub fn apply_overrides(&self, config: &mut IngestConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = &self.bind {
            config.bind_address = bind.clone();
        }
        if let Some(url) = &self.database_url {
            config.database_url = Some(url.clone());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "feedback-server",
            "--port",
            "9001",
            "--bind",
            "0.0.0.0",
            "--database-url",
            "postgres://localhost/feedback",
        ])
        .unwrap();
        let mut config = IngestConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.port, 9001);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/feedback"));
    }

    #[test]
    fn test_hash_key_subcommand() {
        let cli = Cli::try_parse_from(["feedback-server", "hash-key", "fk_live_abc"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::HashKey { key }) if key == "fk_live_abc"));
    }
}
