//! Core application

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::api::ApiServer;
use crate::broker::Broker;
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub broker: Arc<Broker>,
    pub started_at: Instant,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(&cli_config)?;
        Self::start_server(app).await
    }

    fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let broker = Arc::new(Broker::new());
        let shutdown = ShutdownService::new();

        Ok(Self {
            shutdown,
            config,
            broker,
            started_at: Instant::now(),
        })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        tracing::info!(
            host = %app.config.server.host,
            port = app.config.server.port,
            "Starting broker"
        );

        ApiServer::new(app).start().await
    }
}
