use anyhow::{Result, bail};

use super::cli::CliConfig;
use super::constants::{DEFAULT_HOST, DEFAULT_PORT};

/// Application configuration
///
/// The broker keeps no persisted state and reads no config file; settings
/// come from built-in defaults overridden by environment variables and
/// CLI flags (clap resolves the env layer).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
}

/// Server binding configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            },
        }
    }
}

impl AppConfig {
    /// Build the effective configuration from defaults and CLI overrides
    pub fn load(cli: &CliConfig) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = &cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            bail!("Server host must not be empty");
        }
        if self.server.port == 0 {
            bail!("Server port must be non-zero");
        }
        Ok(())
    }
}
