//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod capture;
pub mod config;
pub mod event_source;
pub mod notifier;
pub mod router;
pub mod tagger;

// Re-export common types
pub use capture::{CaptureError, CaptureLauncher, CapturePipeline};
pub use config::ConfigStore;
pub use event_source::{EventSourceError, PlaybackEventSource};
pub use notifier::{NotificationError, NotificationIcon, Notifier, SilentNotifier};
pub use router::{AudioRouter, RoutingError, SinkModuleId, StreamId};
pub use tagger::{TagError, Tagger};
