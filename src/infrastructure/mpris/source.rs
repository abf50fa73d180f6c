//! MPRIS playback event source over the D-Bus session bus

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};
use zbus::fdo::PropertiesProxy;
use zbus::zvariant::Value;
use zbus::Connection;

use crate::application::ports::{EventSourceError, PlaybackEventSource};
use crate::domain::error::MetadataError;
use crate::domain::track::{MetadataFields, PlaybackEvent, PlaybackStatus, TrackMetadata};

const BUS_NAME_PREFIX: &str = "org.mpris.MediaPlayer2.";
const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
const PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";

type EventStream = Pin<Box<dyn Stream<Item = PlaybackEvent> + Send>>;

/// Player events from `PropertiesChanged` signals of one MPRIS player
pub struct MprisEventSource {
    player: String,
    events: EventStream,
}

impl MprisEventSource {
    /// Subscribe to `org.mpris.MediaPlayer2.<player>` on the session bus
    pub async fn connect(player: &str) -> Result<Self, EventSourceError> {
        let connection = Connection::session()
            .await
            .map_err(|e| EventSourceError::Connection(e.to_string()))?;
        Self::with_connection(&connection, player).await
    }

    pub async fn with_connection(
        connection: &Connection,
        player: &str,
    ) -> Result<Self, EventSourceError> {
        let subscribe_error = |e: zbus::Error| EventSourceError::Subscribe {
            player: player.to_string(),
            message: e.to_string(),
        };

        let proxy = PropertiesProxy::builder(connection)
            .destination(bus_name(player))
            .map_err(subscribe_error)?
            .path(OBJECT_PATH)
            .map_err(subscribe_error)?
            .build()
            .await
            .map_err(subscribe_error)?;

        let signals = proxy
            .receive_properties_changed()
            .await
            .map_err(|e| subscribe_error(e.into()))?;

        let events = signals.filter_map(|signal| async move {
            let args = match signal.args() {
                Ok(args) => args,
                Err(e) => {
                    warn!(error = %e, "ignoring malformed PropertiesChanged signal");
                    return None;
                }
            };
            if args.interface_name().as_str() != PLAYER_INTERFACE {
                return None;
            }
            event_from_changes(args.changed_properties())
        });

        debug!(player, "subscribed to player properties");

        Ok(Self {
            player: player.to_string(),
            events: Box::pin(events),
        })
    }

    pub fn player(&self) -> &str {
        &self.player
    }
}

#[async_trait]
impl PlaybackEventSource for MprisEventSource {
    async fn next_event(&mut self) -> Option<PlaybackEvent> {
        self.events.next().await
    }
}

/// Well-known bus name of a player
pub fn bus_name(player: &str) -> String {
    format!("{}{}", BUS_NAME_PREFIX, player)
}

/// Reduce a `changed_properties` map to a playback event.
///
/// Unknown statuses are dropped. Incomplete metadata counts as no metadata.
pub fn event_from_changes(changed: &HashMap<&str, Value<'_>>) -> Option<PlaybackEvent> {
    let status = changed
        .get("PlaybackStatus")
        .and_then(|v| string_value(v))
        .and_then(|s| match s.parse::<PlaybackStatus>() {
            Ok(status) => Some(status),
            Err(e) => {
                debug!(error = %e, "ignoring status");
                None
            }
        });

    let metadata = changed
        .get("Metadata")
        .and_then(|v| match metadata_from_value(v) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                debug!(error = %e, "metadata incomplete, treating as absent");
                None
            }
        });

    PlaybackEvent::from_changes(status, metadata)
}

/// Validate an MPRIS `Metadata` dictionary
pub fn metadata_from_value(value: &Value<'_>) -> Result<TrackMetadata, MetadataError> {
    let Value::Dict(dict) = unwrap_variant(value) else {
        return Err(MetadataError::WrongType { field: "Metadata" });
    };

    let mut fields = MetadataFields::default();
    for (key, value) in dict.iter() {
        if let Some(key) = string_value(key) {
            apply_entry(&mut fields, key, value)?;
        }
    }

    TrackMetadata::try_from(fields)
}

/// Record one metadata entry; keys the recorder does not use are skipped.
pub fn apply_entry(
    fields: &mut MetadataFields,
    key: &str,
    value: &Value<'_>,
) -> Result<(), MetadataError> {
    match key {
        "xesam:title" => {
            fields.title = Some(
                string_value(value)
                    .ok_or(MetadataError::WrongType { field: "xesam:title" })?
                    .to_string(),
            );
        }
        "xesam:artist" => {
            fields.artists =
                string_list(value).ok_or(MetadataError::WrongType { field: "xesam:artist" })?;
        }
        "xesam:album" => {
            fields.album = string_value(value).map(str::to_string);
        }
        "xesam:trackNumber" => fields.track_number = position_value(value),
        "xesam:discNumber" => fields.disc_number = position_value(value),
        "mpris:length" => {
            fields.length_micros =
                Some(int_value(value).ok_or(MetadataError::WrongType { field: "mpris:length" })?);
        }
        "mpris:artUrl" => {
            fields.art_url = string_value(value).map(str::to_string);
        }
        _ => {}
    }
    Ok(())
}

/// Strip `v` boxing around a value
fn unwrap_variant<'b, 'a>(value: &'b Value<'a>) -> &'b Value<'a> {
    match value {
        Value::Value(inner) => unwrap_variant(inner),
        other => other,
    }
}

fn string_value<'b>(value: &'b Value<'_>) -> Option<&'b str> {
    match unwrap_variant(value) {
        Value::Str(s) => Some(s.as_str()),
        _ => None,
    }
}

/// `as` array of strings; a lone string is accepted as a one-element list
fn string_list(value: &Value<'_>) -> Option<Vec<String>> {
    match unwrap_variant(value) {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| string_value(item).map(str::to_string))
                .collect(),
        ),
        Value::Str(s) => Some(vec![s.as_str().to_string()]),
        _ => None,
    }
}

/// Track or disc number; values that do not fit count as missing
fn position_value(value: &Value<'_>) -> Option<i32> {
    int_value(value).and_then(|n| i32::try_from(n).ok())
}

/// Integers of any width; players disagree on the type of `mpris:length`
fn int_value(value: &Value<'_>) -> Option<i64> {
    match unwrap_variant(value) {
        Value::I64(n) => Some(*n),
        Value::U64(n) => i64::try_from(*n).ok(),
        Value::I32(n) => Some(i64::from(*n)),
        Value::U32(n) => Some(i64::from(*n)),
        Value::I16(n) => Some(i64::from(*n)),
        Value::U16(n) => Some(i64::from(*n)),
        Value::U8(n) => Some(i64::from(*n)),
        _ => None,
    }
}
