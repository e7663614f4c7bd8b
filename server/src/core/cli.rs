use clap::{Parser, Subcommand};

use super::constants::{ENV_HOST, ENV_PORT};

#[derive(Parser)]
#[command(name = "fanout")]
#[command(version, about = "In-memory pub/sub broker", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the broker (default when no command is given)
    Start,
}

/// CLI overrides passed to config loading
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Parse command-line arguments into overrides and an optional command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
    };
    (config, cli.command)
}
