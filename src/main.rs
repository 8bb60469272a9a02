//! Auth server (v1)
//!
//! ```text
//!     Client ──TCP──▶ net::listener ──▶ net::driver ──read cycle──▶ dispatch
//!                                         │                          │
//!                                         │                guard → classify → processor
//!                                         │                          │
//!     Client ◀──────── http::codec ◀── net::context ◀── write / flush / close
//! ```
//!
//! Requests whose method has no registered processor are accepted and dropped
//! without a response. A fault anywhere on the read path closes the connection.

use std::path::PathBuf;

use clap::Parser;

use authserver::config::{load_config, validate_config, AuthServerConfig, ConfigError};
use authserver::dispatch::{ProcessorRegistry, RequestCategory};
use authserver::lifecycle;
use authserver::observability::init_logging;
use authserver::processors::{server_status, FormActionFactory, STATUS_ACTION};

#[derive(Parser)]
#[command(name = "authserver")]
#[command(about = "Connection-oriented HTTP auth server", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AuthServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    if cli.check_config {
        println!("configuration OK");
        return Ok(());
    }

    init_logging(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config_file = ?cli.config,
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        execution = ?config.dispatch.execution,
        "authserver starting"
    );

    let registry = ProcessorRegistry::builder()
        .register(
            RequestCategory::Create,
            FormActionFactory::new().with_action(STATUS_ACTION, server_status),
        )
        .build();

    lifecycle::run(config, registry).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
