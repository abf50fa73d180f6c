//! Track domain module

mod event;
mod file_name;
mod metadata;

pub use event::{PlaybackEvent, PlaybackStatus};
pub use file_name::{sanitize_component, track_path_candidates, track_stem, RECORDING_EXTENSION};
pub use metadata::{MetadataFields, TrackMetadata};
