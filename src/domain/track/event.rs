//! Normalized playback events

use std::fmt;
use std::str::FromStr;

use super::TrackMetadata;

/// MPRIS `PlaybackStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
}

impl PlaybackStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Playing => "Playing",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
        }
    }
}

impl FromStr for PlaybackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Playing" => Ok(Self::Playing),
            "Paused" => Ok(Self::Paused),
            "Stopped" => Ok(Self::Stopped),
            other => Err(format!("unknown playback status '{}'", other)),
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One property-change notification from the player, reduced to what the
/// recorder cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    StatusChanged(PlaybackStatus),
    TrackChanged(TrackMetadata),
    StatusAndTrackChanged(PlaybackStatus, TrackMetadata),
}

impl PlaybackEvent {
    /// Combine the two interesting fields of a payload into an event.
    ///
    /// Returns `None` when the payload carried neither.
    pub fn from_changes(
        status: Option<PlaybackStatus>,
        metadata: Option<TrackMetadata>,
    ) -> Option<Self> {
        match (status, metadata) {
            (Some(status), Some(metadata)) => Some(Self::StatusAndTrackChanged(status, metadata)),
            (Some(status), None) => Some(Self::StatusChanged(status)),
            (None, Some(metadata)) => Some(Self::TrackChanged(metadata)),
            (None, None) => None,
        }
    }

    pub fn status(&self) -> Option<PlaybackStatus> {
        match self {
            Self::StatusChanged(status) | Self::StatusAndTrackChanged(status, _) => Some(*status),
            Self::TrackChanged(_) => None,
        }
    }

    pub fn metadata(&self) -> Option<&TrackMetadata> {
        match self {
            Self::TrackChanged(metadata) | Self::StatusAndTrackChanged(_, metadata) => {
                Some(metadata)
            }
            Self::StatusChanged(_) => None,
        }
    }
}
