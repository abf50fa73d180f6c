//! Tagging port interface

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::track::TrackMetadata;

/// Tagging errors
#[derive(Debug, Clone, Error)]
pub enum TagError {
    #[error("Failed to write tags: {0}")]
    WriteFailed(String),

    #[error("Failed to fetch cover art: {0}")]
    CoverFetchFailed(String),
}

/// Port for writing track metadata into a finished recording
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Write `metadata` (and cover art, if available) into the file at `path`.
    async fn apply_tags(&self, path: &Path, metadata: &TrackMetadata) -> Result<(), TagError>;
}
