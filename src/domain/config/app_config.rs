//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::recording::Duration;

/// MPRIS bus name suffix of the default player
pub const DEFAULT_PLAYER: &str = "spotify";

/// `media.name` the player's stream input carries in PulseAudio
pub const DEFAULT_MEDIA_NAME: &str = "Spotify";

/// Name given to the combined sink created for capturing
pub const DEFAULT_COMBINED_SINK: &str = "drainify_combined";

/// CDN prefix the artwork identifier is appended to
pub const DEFAULT_ART_URL_PREFIX: &str = "https://i.scdn.co/image/";

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub output_dir: Option<String>,
    pub sink: Option<String>,
    pub player: Option<String>,
    pub media_name: Option<String>,
    pub combined_sink: Option<String>,
    pub pause_grace: Option<String>,
    pub skip_settle: Option<String>,
    pub boundary_lead: Option<String>,
    pub encode_timeout: Option<String>,
    pub art_url_prefix: Option<String>,
    pub notify: Option<bool>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            output_dir: None,
            sink: None,
            player: Some(DEFAULT_PLAYER.to_string()),
            media_name: Some(DEFAULT_MEDIA_NAME.to_string()),
            combined_sink: Some(DEFAULT_COMBINED_SINK.to_string()),
            pause_grace: Some(Duration::default_pause_grace().to_string()),
            skip_settle: Some(Duration::default_skip_settle().to_string()),
            boundary_lead: Some(Duration::default_boundary_lead().to_string()),
            encode_timeout: Some(Duration::default_encode_timeout().to_string()),
            art_url_prefix: Some(DEFAULT_ART_URL_PREFIX.to_string()),
            notify: Some(false),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            output_dir: other.output_dir.or(self.output_dir),
            sink: other.sink.or(self.sink),
            player: other.player.or(self.player),
            media_name: other.media_name.or(self.media_name),
            combined_sink: other.combined_sink.or(self.combined_sink),
            pause_grace: other.pause_grace.or(self.pause_grace),
            skip_settle: other.skip_settle.or(self.skip_settle),
            boundary_lead: other.boundary_lead.or(self.boundary_lead),
            encode_timeout: other.encode_timeout.or(self.encode_timeout),
            art_url_prefix: other.art_url_prefix.or(self.art_url_prefix),
            notify: other.notify.or(self.notify),
        }
    }

    /// Output directory, or the current working directory if not set
    pub fn output_dir_or_default(&self) -> PathBuf {
        self.output_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn player_or_default(&self) -> &str {
        self.player.as_deref().unwrap_or(DEFAULT_PLAYER)
    }

    pub fn media_name_or_default(&self) -> &str {
        self.media_name.as_deref().unwrap_or(DEFAULT_MEDIA_NAME)
    }

    pub fn combined_sink_or_default(&self) -> &str {
        self.combined_sink.as_deref().unwrap_or(DEFAULT_COMBINED_SINK)
    }

    pub fn art_url_prefix_or_default(&self) -> &str {
        self.art_url_prefix
            .as_deref()
            .unwrap_or(DEFAULT_ART_URL_PREFIX)
    }

    /// Get pause grace as parsed Duration, or default if not set/invalid
    pub fn pause_grace_or_default(&self) -> Duration {
        parse_or(&self.pause_grace, Duration::default_pause_grace())
    }

    /// Get skip settle delay as parsed Duration, or default if not set/invalid
    pub fn skip_settle_or_default(&self) -> Duration {
        parse_or(&self.skip_settle, Duration::default_skip_settle())
    }

    /// Get boundary lead as parsed Duration, or default if not set/invalid
    pub fn boundary_lead_or_default(&self) -> Duration {
        parse_or(&self.boundary_lead, Duration::default_boundary_lead())
    }

    /// Get encoder timeout as parsed Duration, or default if not set/invalid
    pub fn encode_timeout_or_default(&self) -> Duration {
        parse_or(&self.encode_timeout, Duration::default_encode_timeout())
    }

    /// Get notify setting, or false if not set
    pub fn notify_or_default(&self) -> bool {
        self.notify.unwrap_or(false)
    }
}

fn parse_or(value: &Option<String>, fallback: Duration) -> Duration {
    value
        .as_ref()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}
