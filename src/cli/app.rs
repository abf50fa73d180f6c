//! Main app runner for recording mode

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::application::ports::{
    AudioRouter, ConfigStore, EventSourceError, NotificationIcon, Notifier, RoutingError,
};
use crate::application::{
    choose_sink, ActiveRoute, Finalizer, RecorderUpdate, RecordingOrchestrator, RecordingPolicy,
    RouteRequest, RouteSetup, RunOutcome,
};
use crate::domain::config::AppConfig;
use crate::infrastructure::{
    create_notifier, Id3Tagger, MprisEventSource, PactlRouter, ParecLameLauncher, XdgConfigStore,
};

use super::args::RecordOptions;
use super::presenter::Presenter;
use super::signals::ShutdownSignal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Problems that stop the recorder before or while it sets up
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Output directory {} was not created", .0.display())]
    OutputDirDeclined(PathBuf),

    #[error("{} exists and is not a directory", .0.display())]
    OutputNotADirectory(PathBuf),

    #[error("Failed to create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid sink choice '{0}'")]
    InvalidSinkChoice(String),

    #[error("Failed to read answer: {0}")]
    Prompt(#[source] io::Error),

    #[error("Failed to set up signal handlers: {0}")]
    Signals(#[source] io::Error),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    EventSource(#[from] EventSourceError),
}

/// Record until SIGINT/SIGTERM or until the player goes away
pub async fn run_recorder(options: RecordOptions) -> ExitCode {
    let presenter = Presenter::new();

    match record(&options, &presenter).await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn record(options: &RecordOptions, presenter: &Presenter) -> Result<(), StartupError> {
    ensure_output_dir(&options.output_dir, options.assume_yes, presenter)?;

    let setup = RouteSetup::new(PactlRouter::new());
    let slave_sink = select_sink(&setup, options.sink.as_deref(), presenter).await?;

    // Installed after the prompts so Ctrl+C still aborts them
    let mut shutdown = ShutdownSignal::install().map_err(StartupError::Signals)?;
    let route = setup
        .establish(&RouteRequest {
            slave_sink,
            combined_sink: options.combined_sink.clone(),
            media_name: options.media_name.clone(),
        })
        .await?;

    let result = record_route(options, &route, &mut shutdown, presenter).await;

    // The player's stream falls back to its previous sink once this is gone
    if let Err(e) = setup.teardown(&route).await {
        presenter.warn(&format!("Failed to unload combined sink: {}", e));
    }

    result
}

async fn record_route(
    options: &RecordOptions,
    route: &ActiveRoute,
    shutdown: &mut ShutdownSignal,
    presenter: &Presenter,
) -> Result<(), StartupError> {
    let mut source = MprisEventSource::connect(&options.player).await?;

    let finalizer = Finalizer::new(
        Id3Tagger::with_art_url_prefix(options.art_url_prefix.clone()),
        options.output_dir.clone(),
        options.encode_timeout,
    );
    let policy = RecordingPolicy {
        capture_device: route.monitor_device(),
        pause_grace: options.pause_grace,
        skip_settle: options.skip_settle,
        boundary_lead: options.boundary_lead,
    };

    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(report_updates(updates_rx, create_notifier(options.notify)));

    let mut orchestrator =
        RecordingOrchestrator::new(ParecLameLauncher::new(), finalizer, policy, updates_tx);

    presenter.info(&format!(
        "Waiting for {} to play. Saving to {} (Ctrl+C to stop)",
        options.player,
        options.output_dir.display()
    ));

    let outcome = orchestrator.run(&mut source, shutdown.wait()).await;
    if outcome == RunOutcome::SourceClosed {
        presenter.warn("Lost connection to the player");
    }

    let report = orchestrator.shutdown().await;
    debug!(?report, "recorder drained");

    // Closes the update channel so the reporter finishes
    drop(orchestrator);
    if let Err(e) = reporter.await {
        warn!(error = %e, "update reporter failed");
    }

    if report.discarded > 0 {
        presenter.info(&format!(
            "Discarded {} unfinished recording(s)",
            report.discarded
        ));
    }

    Ok(())
}

/// Print and notify recorder progress until the orchestrator is gone
async fn report_updates(
    mut updates: mpsc::UnboundedReceiver<RecorderUpdate>,
    notifier: Box<dyn Notifier>,
) {
    let presenter = Presenter::new();

    while let Some(update) = updates.recv().await {
        let notification = match update {
            RecorderUpdate::Started { metadata, .. } => {
                presenter.recording(&metadata);
                Some(("Recording", metadata.to_string(), NotificationIcon::Recording))
            }
            RecorderUpdate::StartFailed { metadata, reason } => {
                presenter.error(&format!("Could not record {}: {}", metadata, reason));
                Some(("Recording failed", reason, NotificationIcon::Warning))
            }
            RecorderUpdate::Discarded { metadata, .. } => {
                presenter.discarded(&metadata);
                None
            }
            RecorderUpdate::Saved(track) => {
                presenter.saved(&track);
                Some((
                    "Saved",
                    format!("{} - {}", track.artist, track.title),
                    NotificationIcon::Saved,
                ))
            }
            RecorderUpdate::Failed { metadata, reason } => {
                presenter.error(&format!("Lost {}: {}", metadata, reason));
                Some(("Recording lost", metadata.to_string(), NotificationIcon::Warning))
            }
        };

        if let Some((title, message, icon)) = notification {
            if let Err(e) = notifier.notify(title, &message, icon).await {
                debug!(error = %e, "notification not shown");
            }
        }
    }
}

/// Make sure the output directory exists, asking before creating it
pub fn ensure_output_dir(
    dir: &Path,
    assume_yes: bool,
    presenter: &Presenter,
) -> Result<(), StartupError> {
    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(StartupError::OutputNotADirectory(dir.to_path_buf()));
    }

    if !assume_yes {
        let create = presenter
            .confirm(&format!("Create output directory {}?", dir.display()))
            .map_err(StartupError::Prompt)?;
        if !create {
            return Err(StartupError::OutputDirDeclined(dir.to_path_buf()));
        }
    }

    std::fs::create_dir_all(dir).map_err(|source| StartupError::OutputDir {
        path: dir.to_path_buf(),
        source,
    })?;
    presenter.success(&format!("Created {}", dir.display()));
    Ok(())
}

/// Sink the combined sink mirrors into: the configured one, the only one,
/// or whatever the user picks
async fn select_sink<R: AudioRouter>(
    setup: &RouteSetup<R>,
    configured: Option<&str>,
    presenter: &Presenter,
) -> Result<String, StartupError> {
    if let Some(sink) = configured {
        return Ok(sink.to_string());
    }

    let sinks = setup.list_sinks().await?;
    if let [only] = sinks.as_slice() {
        return Ok(only.clone());
    }

    presenter.info("Choose the output to keep listening on:");
    presenter.sink_list(&sinks);
    let answer = presenter
        .prompt("Sink (default [0]):")
        .map_err(StartupError::Prompt)?;

    choose_sink(&sinks, &answer).ok_or(StartupError::InvalidSinkChoice(answer))
}

/// Load and merge configuration from file and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %store.path().display(), error = %e, "ignoring config file");
            AppConfig::empty()
        }
    };

    // Merge: defaults < file < cli
    AppConfig::defaults().merge(file_config).merge(cli_config)
}
