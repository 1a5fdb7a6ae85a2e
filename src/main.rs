use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, info};

use blob_sync::cli::{Cli, Command};
use blob_sync::config::{self, AppConfig, MergeEnv};
use blob_sync::handlers::{self, AppContext};
use blob_sync::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout and succeed; anything else is a usage error.
            let code = if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
            let _ = e.print();
            return code;
        }
    };

    let loaded = config::try_load_config(cli.config.as_deref());
    let log_path = loaded
        .as_ref()
        .map(|cfg| cfg.log_path.clone())
        .unwrap_or_default();
    let _guard = logging::init_logging(&log_path);

    match run(cli, config::load_config_or_default(loaded)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Printed directly so RUST_LOG cannot hide it.
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, mut app_config: AppConfig) -> anyhow::Result<()> {
    // Missing merge variables must fail before any client is built.
    if cli.command == Command::Merge {
        MergeEnv::from_env()?;
    }

    app_config.apply_env_overrides(|name| std::env::var(name).ok())?;
    if let Some(concurrency) = cli.concurrency {
        app_config.concurrency = concurrency;
        app_config.validate()?;
    }
    debug!(
        "Config file: {:?}",
        cli.config.clone().or_else(config::get_config_path)
    );

    let ctx = AppContext::connect(app_config).await?;
    info!("Running {}", cli.command.name());
    let mut stdout = std::io::stdout();
    handlers::dispatch(cli.command, &ctx, &mut stdout).await
}
