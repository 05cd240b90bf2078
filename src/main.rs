//! compose-installer CLI entrypoint

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use compose_installer::cli::Cli;
use compose_installer::config::Config;
use compose_installer::core::{Project, Renderer, TracingReporter};

#[tokio::main]
async fn main() -> ExitCode {
    // Help still works without a configuration, using the default messages
    let loaded = Config::load();
    let help_config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::new(env!("CARGO_PKG_NAME")),
    };
    let renderer = Renderer::from_config(&help_config);

    let cli = match Cli::try_parse_for(&help_config, &renderer, std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    init_tracing(cli.debug);

    match run(cli, loaded).await {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing; `RUST_LOG` wins over `--debug`
fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time(),
        )
        .init();
}

async fn run(cli: Cli, loaded: compose_installer::Result<Config>) -> Result<ExitCode> {
    let config = loaded.context("Failed to load configuration")?;
    let project = Project::connect(config, Arc::new(TracingReporter))
        .context("Failed to prepare project")?;

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });

    let code = cli.execute(&project, &cancel).await;
    project.close().await;
    Ok(code)
}
