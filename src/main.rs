//! drainify CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drainify::cli::{
    app::{load_merged_config, run_recorder, EXIT_ERROR, EXIT_USAGE_ERROR},
    args::{Cli, Commands, RecordOptions},
    config_cmd::handle_config_command,
    presenter::Presenter,
};
use drainify::domain::error::ConfigError;
use drainify::infrastructure::XdgConfigStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    // Diagnostics go to stderr, stdout is reserved for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drainify=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let presenter = Presenter::new();

    if let Some(Commands::Config { action }) = cli.command {
        let store = XdgConfigStore::new();
        return match handle_config_command(action, &store, &presenter).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e @ ConfigError::ValidationError { .. }) => {
                presenter.error(&e.to_string());
                ExitCode::from(EXIT_USAGE_ERROR)
            }
            Err(e) => {
                presenter.error(&e.to_string());
                ExitCode::from(EXIT_ERROR)
            }
        };
    }

    // Merge config: defaults < file < cli
    let config = load_merged_config(cli.to_config()).await;

    let options = match RecordOptions::from_config(&config, cli.yes) {
        Ok(options) => options,
        Err(e) => {
            presenter.error(&e);
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    run_recorder(options).await
}
