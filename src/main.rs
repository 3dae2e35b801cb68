use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use streameye::config::{Cli, Config};
use streameye::error::StartupError;
use streameye::hub::FrameHub;
use streameye::{producer, signals};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, auth) = match Config::from_cli(&cli) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("streameye: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.log_level.as_filter());

    match run(config, auth) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config, auth: streameye::auth::AuthConfig) -> Result<(), StartupError> {
    let hub = FrameHub::new();
    signals::install(hub.clone()).map_err(StartupError::Signals)?;

    tracing::info!(
        addr = %config.listen_addr,
        max_clients = config.max_clients,
        "streameye {}",
        streameye::SERVER_VERSION
    );

    producer::run(&config, hub, Arc::new(auth))
}

fn init_tracing(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
