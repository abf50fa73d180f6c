//! Playback event source port interface

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::track::PlaybackEvent;

/// Errors while connecting to the player
#[derive(Debug, Clone, Error)]
pub enum EventSourceError {
    #[error("Failed to connect to the session bus: {0}")]
    Connection(String),

    #[error("Failed to subscribe to player '{player}': {message}")]
    Subscribe { player: String, message: String },
}

/// Port delivering normalized player events in arrival order
#[async_trait]
pub trait PlaybackEventSource: Send {
    /// Next event, or `None` once the source has closed.
    async fn next_event(&mut self) -> Option<PlaybackEvent>;
}
