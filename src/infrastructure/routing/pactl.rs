//! PulseAudio routing adapter driving the `pactl` command line tool

use std::io;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::application::ports::{AudioRouter, RoutingError, SinkModuleId, StreamId};

const PACTL: &str = "pactl";

/// Router backed by `pactl`
#[derive(Debug, Clone, Default)]
pub struct PactlRouter;

impl PactlRouter {
    pub fn new() -> Self {
        Self
    }

    /// Run pactl and return its stdout.
    ///
    /// Output is forced to the C locale, the parsers below match English
    /// headings.
    async fn run(&self, args: &[&str]) -> Result<String, RoutingError> {
        let command = args.join(" ");
        debug!(command = %command, "running pactl");

        let output = Command::new(PACTL)
            .args(args)
            .env("LC_ALL", "C")
            .output()
            .await
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    RoutingError::PactlNotFound
                } else {
                    RoutingError::CommandFailed {
                        command: command.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            return Err(RoutingError::CommandFailed {
                command,
                message: if message.is_empty() {
                    output.status.to_string()
                } else {
                    message.to_string()
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl AudioRouter for PactlRouter {
    async fn list_sinks(&self) -> Result<Vec<String>, RoutingError> {
        let out = self.run(&["list", "sinks", "short"]).await?;
        Ok(parse_short_sinks(&out))
    }

    async fn find_player_stream(&self, media_name: &str) -> Result<StreamId, RoutingError> {
        let out = self.run(&["list", "sink-inputs"]).await?;
        find_stream_by_media_name(&out, media_name)
            .ok_or_else(|| RoutingError::StreamNotFound(media_name.to_string()))
    }

    async fn create_combined_sink(
        &self,
        name: &str,
        slave: &str,
    ) -> Result<SinkModuleId, RoutingError> {
        let sink_name = format!("sink_name={}", name);
        let slaves = format!("slaves={}", slave);
        let out = self
            .run(&["load-module", "module-combine-sink", &sink_name, &slaves])
            .await?;

        parse_module_id(&out).ok_or_else(|| RoutingError::CommandFailed {
            command: "load-module module-combine-sink".to_string(),
            message: format!("unexpected output '{}'", out.trim()),
        })
    }

    async fn move_stream(&self, stream: &StreamId, sink_name: &str) -> Result<(), RoutingError> {
        self.run(&["move-sink-input", &stream.0, sink_name]).await?;
        Ok(())
    }

    async fn unload_sink(&self, module: &SinkModuleId) -> Result<(), RoutingError> {
        self.run(&["unload-module", &module.0]).await?;
        Ok(())
    }
}

/// Sink names from `pactl list sinks short` (second tab-separated column)
pub fn parse_short_sinks(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split('\t').nth(1))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Index of the first sink input whose `media.name` property equals
/// `media_name`, from `pactl list sink-inputs`
pub fn find_stream_by_media_name(output: &str, media_name: &str) -> Option<StreamId> {
    let wanted = format!("media.name = \"{}\"", media_name);
    let mut current: Option<&str> = None;

    for line in output.lines() {
        let line = line.trim();
        if let Some(index) = line.strip_prefix("Sink Input #") {
            current = Some(index.trim());
        } else if line == wanted {
            if let Some(index) = current.filter(|i| i.chars().all(|c| c.is_ascii_digit())) {
                return Some(StreamId(index.to_string()));
            }
        }
    }

    None
}

/// Module index printed by `pactl load-module`
pub fn parse_module_id(output: &str) -> Option<SinkModuleId> {
    let id = output.trim();
    (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| SinkModuleId(id.to_string()))
}
