//! Track metadata value object

use std::fmt;

use crate::domain::error::MetadataError;

/// Loose view of an MPRIS `Metadata` map.
///
/// Adapters fill in whatever the player reported; validation happens when
/// converting into [`TrackMetadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFields {
    pub title: Option<String>,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub track_number: Option<i32>,
    pub disc_number: Option<i32>,
    pub length_micros: Option<i64>,
    pub art_url: Option<String>,
}

/// Snapshot of the track being played when a recording starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackMetadata {
    title: String,
    artist: String,
    album: String,
    track_number: i32,
    disc_number: i32,
    length_micros: i64,
    art_url_suffix: String,
}

impl TrackMetadata {
    /// Build metadata from already validated values.
    pub fn new(title: impl Into<String>, artist: impl Into<String>, length_micros: i64) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: String::new(),
            track_number: 0,
            disc_number: 0,
            length_micros,
            art_url_suffix: String::new(),
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    pub fn with_position(mut self, track_number: i32, disc_number: i32) -> Self {
        self.track_number = track_number;
        self.disc_number = disc_number;
        self
    }

    pub fn with_art_url(mut self, art_url: &str) -> Self {
        self.art_url_suffix = art_id_from_url(art_url).to_string();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// First artist reported by the player
    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn album(&self) -> &str {
        &self.album
    }

    pub fn track_number(&self) -> i32 {
        self.track_number
    }

    pub fn disc_number(&self) -> i32 {
        self.disc_number
    }

    pub fn length_micros(&self) -> i64 {
        self.length_micros
    }

    /// Final path segment of `mpris:artUrl`, empty when the player sent none
    pub fn art_url_suffix(&self) -> &str {
        &self.art_url_suffix
    }

    /// Full cover URL for the given CDN prefix, if the track has artwork
    pub fn cover_url(&self, prefix: &str) -> Option<String> {
        if self.art_url_suffix.is_empty() {
            None
        } else {
            Some(format!("{}{}", prefix, self.art_url_suffix))
        }
    }
}

impl TryFrom<MetadataFields> for TrackMetadata {
    type Error = MetadataError;

    fn try_from(fields: MetadataFields) -> Result<Self, Self::Error> {
        let title = fields
            .title
            .ok_or(MetadataError::MissingField("xesam:title"))?;
        let artist = fields
            .artists
            .into_iter()
            .next()
            .ok_or(MetadataError::MissingField("xesam:artist"))?;
        let length_micros = fields
            .length_micros
            .ok_or(MetadataError::MissingField("mpris:length"))?;

        let metadata = Self::new(title, artist, length_micros)
            .with_album(fields.album.unwrap_or_default())
            .with_position(
                fields.track_number.unwrap_or(0),
                fields.disc_number.unwrap_or(0),
            );

        Ok(match fields.art_url {
            Some(url) => metadata.with_art_url(&url),
            None => metadata,
        })
    }
}

impl fmt::Display for TrackMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// Artwork identifier: the part of the URL after the last `/`
fn art_id_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or_default()
}
