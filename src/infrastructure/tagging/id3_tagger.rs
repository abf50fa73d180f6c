//! ID3v2.4 tagger adapter with cover art download

use std::path::Path;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use id3::frame::{Picture, PictureType};
use id3::{Tag, TagLike, Version};
use tracing::{debug, warn};

use crate::application::ports::{TagError, Tagger};
use crate::domain::config::DEFAULT_ART_URL_PREFIX;
use crate::domain::track::TrackMetadata;

const COVER_FETCH_TIMEOUT: StdDuration = StdDuration::from_secs(10);
const DEFAULT_COVER_MIME: &str = "image/jpeg";

/// Downloaded cover image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Writes artist, album, title, position and front cover as ID3v2.4
pub struct Id3Tagger {
    client: reqwest::Client,
    art_url_prefix: String,
}

impl Id3Tagger {
    pub fn new() -> Self {
        Self::with_art_url_prefix(DEFAULT_ART_URL_PREFIX)
    }

    /// Use another CDN prefix for cover URLs
    pub fn with_art_url_prefix(prefix: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            art_url_prefix: prefix.into(),
        }
    }

    pub fn art_url_prefix(&self) -> &str {
        &self.art_url_prefix
    }

    async fn fetch_cover(&self, url: &str) -> Result<Cover, TagError> {
        let response = self
            .client
            .get(url)
            .timeout(COVER_FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| TagError::CoverFetchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TagError::CoverFetchFailed(format!("HTTP {} for {}", status, url)));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or(DEFAULT_COVER_MIME)
            .to_string();

        let data = response
            .bytes()
            .await
            .map_err(|e| TagError::CoverFetchFailed(e.to_string()))?;

        if data.is_empty() {
            return Err(TagError::CoverFetchFailed(format!("empty body from {}", url)));
        }

        Ok(Cover {
            mime_type,
            data: data.to_vec(),
        })
    }
}

impl Default for Id3Tagger {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the tag for a track. Zero positions and an empty album are left out.
pub fn build_tag(metadata: &TrackMetadata, cover: Option<Cover>) -> Tag {
    let mut tag = Tag::new();
    tag.set_artist(metadata.artist());
    tag.set_title(metadata.title());

    if !metadata.album().is_empty() {
        tag.set_album(metadata.album());
    }
    if let Ok(track) = u32::try_from(metadata.track_number()) {
        if track > 0 {
            tag.set_track(track);
        }
    }
    if let Ok(disc) = u32::try_from(metadata.disc_number()) {
        if disc > 0 {
            tag.set_disc(disc);
        }
    }

    if let Some(cover) = cover {
        tag.add_frame(Picture {
            mime_type: cover.mime_type,
            picture_type: PictureType::CoverFront,
            description: String::new(),
            data: cover.data,
        });
    }

    tag
}

#[async_trait]
impl Tagger for Id3Tagger {
    async fn apply_tags(&self, path: &Path, metadata: &TrackMetadata) -> Result<(), TagError> {
        // No cover is not fatal, the text frames are still worth having
        let cover = match metadata.cover_url(&self.art_url_prefix) {
            Some(url) => match self.fetch_cover(&url).await {
                Ok(cover) => Some(cover),
                Err(e) => {
                    warn!(track = %metadata, error = %e, "tagging without cover");
                    None
                }
            },
            None => None,
        };

        let tag = build_tag(metadata, cover);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || tag.write_to_path(&path, Version::Id3v24))
            .await
            .map_err(|e| TagError::WriteFailed(e.to_string()))?
            .map_err(|e| TagError::WriteFailed(e.to_string()))?;

        debug!(track = %metadata, "tags written");
        Ok(())
    }
}
