//! Output file naming

use std::path::{Path, PathBuf};

use super::TrackMetadata;

/// Extension of every finished recording
pub const RECORDING_EXTENSION: &str = "mp3";

const UNKNOWN: &str = "Unknown";

/// Make a tag value safe to use as part of a single path component.
///
/// Path separators, NUL and control characters become `_`, surrounding
/// whitespace is dropped and leading dots are removed so the result can never
/// be hidden or climb out of the output directory.
pub fn sanitize_component(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim().trim_start_matches('.').trim_start();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<artist> - <title>` with both parts sanitized, without extension
pub fn track_stem(metadata: &TrackMetadata) -> String {
    format!(
        "{} - {}",
        sanitize_component(metadata.artist()),
        sanitize_component(metadata.title())
    )
}

/// Possible final locations of a recording inside `dir`, in order of
/// preference: `<stem>.mp3`, then `<stem> (2).mp3`, `<stem> (3).mp3`, ...
///
/// The caller claims the first one that does not exist yet.
pub fn track_path_candidates(
    dir: &Path,
    metadata: &TrackMetadata,
) -> impl Iterator<Item = PathBuf> {
    let dir = dir.to_path_buf();
    let stem = track_stem(metadata);

    std::iter::once(dir.join(format!("{}.{}", stem, RECORDING_EXTENSION))).chain(
        (2..=u32::MAX)
            .map(move |n| dir.join(format!("{} ({}).{}", stem, n, RECORDING_EXTENSION))),
    )
}
