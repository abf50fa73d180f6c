//! Configuration domain module

mod app_config;

pub use app_config::{
    AppConfig, DEFAULT_ART_URL_PREFIX, DEFAULT_COMBINED_SINK, DEFAULT_MEDIA_NAME, DEFAULT_PLAYER,
};
