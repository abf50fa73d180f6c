//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::config::AppConfig;
use crate::domain::recording::Duration;

/// drainify - record what your music player plays, one tagged MP3 per track
#[derive(Parser, Debug)]
#[command(name = "drainify")]
#[command(version)]
#[command(about = "Record the tracks an MPRIS player plays into tagged MP3 files")]
#[command(long_about = None)]
pub struct Cli {
    /// Directory the finished tracks are written to (default: current directory)
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output sink to keep playing through (skips the sink prompt)
    #[arg(short = 's', long, value_name = "NAME")]
    pub sink: Option<String>,

    /// MPRIS player name, as in org.mpris.MediaPlayer2.<NAME>
    #[arg(long, value_name = "NAME")]
    pub player: Option<String>,

    /// Answer yes to prompts (create the output directory without asking)
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Show desktop notifications
    #[arg(short = 'n', long)]
    pub notify: bool,

    /// Config subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Config layer built from the flags that were given
    pub fn to_config(&self) -> AppConfig {
        AppConfig {
            output_dir: self
                .output_dir
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            sink: self.sink.clone(),
            player: self.player.clone(),
            notify: if self.notify { Some(true) } else { None },
            ..Default::default()
        }
    }
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Resolved options for a recording run
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub output_dir: PathBuf,
    pub sink: Option<String>,
    pub player: String,
    pub media_name: String,
    pub combined_sink: String,
    pub pause_grace: Duration,
    pub skip_settle: Duration,
    pub boundary_lead: Duration,
    pub encode_timeout: Duration,
    pub art_url_prefix: String,
    pub assume_yes: bool,
    pub notify: bool,
}

impl RecordOptions {
    /// Resolve a merged config. Durations must parse; anything else falls
    /// back to its default.
    pub fn from_config(config: &AppConfig, assume_yes: bool) -> Result<Self, String> {
        Ok(Self {
            output_dir: config.output_dir_or_default(),
            sink: config.sink.clone(),
            player: config.player_or_default().to_string(),
            media_name: config.media_name_or_default().to_string(),
            combined_sink: config.combined_sink_or_default().to_string(),
            pause_grace: parse_duration("pause_grace", &config.pause_grace)?
                .unwrap_or_else(Duration::default_pause_grace),
            skip_settle: parse_duration("skip_settle", &config.skip_settle)?
                .unwrap_or_else(Duration::default_skip_settle),
            boundary_lead: parse_duration("boundary_lead", &config.boundary_lead)?
                .unwrap_or_else(Duration::default_boundary_lead),
            encode_timeout: parse_duration("encode_timeout", &config.encode_timeout)?
                .unwrap_or_else(Duration::default_encode_timeout),
            art_url_prefix: config.art_url_prefix_or_default().to_string(),
            assume_yes,
            notify: config.notify_or_default(),
        })
    }
}

fn parse_duration(key: &str, value: &Option<String>) -> Result<Option<Duration>, String> {
    value
        .as_deref()
        .map(|s| s.parse::<Duration>())
        .transpose()
        .map_err(|e| format!("Invalid {}: {}", key, e))
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "output_dir",
    "sink",
    "player",
    "media_name",
    "combined_sink",
    "pause_grace",
    "skip_settle",
    "boundary_lead",
    "encode_timeout",
    "art_url_prefix",
    "notify",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
