//! drainify - record an MPRIS music player into tagged MP3 files
//!
//! The player's audio stream is routed through a PulseAudio combined sink
//! whose monitor is captured with `parec` and encoded with `lame`. Track
//! changes reported over MPRIS start and stop one recording per track;
//! finished tracks get ID3 tags and cover art and land in the output
//! directory as `<artist> - <title>.mp3`.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Track metadata, playback events, durations, file naming and errors
//! - **Application**: The recording orchestrator, finalizer, route setup and port traits
//! - **Infrastructure**: Adapters for pactl, parec/lame, MPRIS over D-Bus, ID3 and config
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
