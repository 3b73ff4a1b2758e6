//! `inscribe` server binary

use clap::Parser;
use inscribe::{AppState, StartupError, build_application};
use inscribe_config::PlatformSettings;
use inscribe_log::{LogConfig, error, info};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

/// Inscribe multi-tenant blogging server
#[derive(Parser, Debug)]
#[command(name = "inscribe")]
#[command(version)]
#[command(about = "Serve Inscribe blogs over HTTP")]
struct Cli {
    /// Configuration file (TOML, JSON or .env)
    #[arg(short, long, env = "INSCRIBE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match LogConfig::from_env().init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("inscribe: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    let mut settings = PlatformSettings::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    let raw_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let addr: SocketAddr = raw_addr
        .parse()
        .map_err(|_| StartupError::Address(raw_addr.clone()))?;

    let state = AppState::from_settings(settings)?;

    if state.settings.directory.background_refresh {
        state
            .cache
            .spawn_refresher(state.settings.directory.refresh_interval());
    } else if let Err(e) = state.cache.refresh().await {
        // Requests retry the refresh once the snapshot is stale
        error!(error = %e, "Initial directory refresh failed");
    }

    info!(
        addr = %addr,
        main_domain = %state.main_domain(),
        data_dir = %state.settings.storage.data_dir.display(),
        "Starting Inscribe"
    );
    build_application(state).listen(addr).await?;
    Ok(())
}
