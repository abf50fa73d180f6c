//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces, integrating
//! with pactl, parec, lame, the session bus and the file system.

pub mod capture;
pub mod config;
pub mod mpris;
pub mod notification;
pub mod routing;
pub mod tagging;

// Re-export adapters
pub use capture::ParecLameLauncher;
pub use config::XdgConfigStore;
pub use mpris::MprisEventSource;
pub use notification::{create_notifier, NotifySendNotifier};
pub use routing::PactlRouter;
pub use tagging::Id3Tagger;
