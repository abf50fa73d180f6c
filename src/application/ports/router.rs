//! Audio routing port interface

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Audio routing errors
#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("pactl not found. Please install PulseAudio utilities (pulseaudio-utils)")]
    PactlNotFound,

    #[error("No stream from '{0}' found. Please start the player and play something first")]
    StreamNotFound(String),

    #[error("No audio sinks available")]
    NoSinks,

    #[error("pactl {command} failed: {message}")]
    CommandFailed { command: String, message: String },
}

/// Index of a stream input (one application's output) in the sound server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId(pub String);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Module index of a loaded combined sink, needed to unload it again
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SinkModuleId(pub String);

impl fmt::Display for SinkModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Port for the host sound server
#[async_trait]
pub trait AudioRouter: Send + Sync {
    /// Names of all output sinks
    async fn list_sinks(&self) -> Result<Vec<String>, RoutingError>;

    /// Stream input belonging to the player, matched by `media.name`
    async fn find_player_stream(&self, media_name: &str) -> Result<StreamId, RoutingError>;

    /// Create a combined sink called `name` that mirrors into `slave`
    async fn create_combined_sink(
        &self,
        name: &str,
        slave: &str,
    ) -> Result<SinkModuleId, RoutingError>;

    /// Move a stream input into the sink called `sink_name`
    async fn move_stream(&self, stream: &StreamId, sink_name: &str) -> Result<(), RoutingError>;

    /// Unload a previously created combined sink
    async fn unload_sink(&self, module: &SinkModuleId) -> Result<(), RoutingError>;
}
