//! Configuration module for the chat relay.
//!
//! The process interface is deliberately small: a TCP port to listen
//! on, plus a few ambient flags. All state is in-memory; there is no
//! configuration file.

use clap::Parser;

/// Command-line arguments for the chat relay
#[derive(Parser, Debug)]
#[command(name = "chat-relay")]
#[command(version = "0.1.0")]
#[command(about = "A readiness-driven TCP chat relay", long_about = None)]
pub struct CliArgs {
    /// TCP port to listen on
    pub port: u16,

    /// Address to bind to (all local addresses by default)
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Maximum number of concurrent client connections
    #[arg(long, default_value_t = 1024)]
    pub max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI arguments.
    pub fn load() -> Self {
        Self::from_args(CliArgs::parse())
    }

    fn from_args(cli: CliArgs) -> Self {
        Config {
            host: cli.host,
            port: cli.port,
            max_connections: cli.max_connections,
            log_level: cli.log_level,
        }
    }

    /// Bind address in `host:port` form.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
