use std::path::PathBuf;
use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use webshell_downloads::app;
use webshell_downloads::domain::ShellConfig;

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the host protocol
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match ShellConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match app::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Host stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
