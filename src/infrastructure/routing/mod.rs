//! Audio routing infrastructure module

mod pactl;

pub use pactl::{find_stream_by_media_name, parse_module_id, parse_short_sinks, PactlRouter};
