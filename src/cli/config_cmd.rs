//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;
use crate::domain::recording::Duration;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    validate_config_value(key, value)?;

    let mut config = store.load().await?;
    set_value(&mut config, key, value)?;
    store.save(&config).await?;

    presenter.success(&format!("{} = {}", key, value));
    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let config = store.load().await?;
    presenter.output(get_value(&config, key).as_deref().unwrap_or(NOT_SET));
    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        presenter.key_value(key, get_value(&config, key).as_deref().unwrap_or(NOT_SET));
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

fn set_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let text = Some(value.to_string());
    match key {
        "output_dir" => config.output_dir = text,
        "sink" => config.sink = text,
        "player" => config.player = text,
        "media_name" => config.media_name = text,
        "combined_sink" => config.combined_sink = text,
        "pause_grace" => config.pause_grace = text,
        "skip_settle" => config.skip_settle = text,
        "boundary_lead" => config.boundary_lead = text,
        "encode_timeout" => config.encode_timeout = text,
        "art_url_prefix" => config.art_url_prefix = text,
        "notify" => config.notify = Some(bool_value(key, value)?),
        _ => check_key(key)?,
    }
    Ok(())
}

fn get_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "output_dir" => config.output_dir.clone(),
        "sink" => config.sink.clone(),
        "player" => config.player.clone(),
        "media_name" => config.media_name.clone(),
        "combined_sink" => config.combined_sink.clone(),
        "pause_grace" => config.pause_grace.clone(),
        "skip_settle" => config.skip_settle.clone(),
        "boundary_lead" => config.boundary_lead.clone(),
        "encode_timeout" => config.encode_timeout.clone(),
        "art_url_prefix" => config.art_url_prefix.clone(),
        "notify" => config.notify.map(|b| b.to_string()),
        _ => None,
    }
}

/// Validate a config value based on key type
fn validate_config_value(key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::ValidationError {
        key: key.to_string(),
        message,
    };

    match key {
        "pause_grace" | "skip_settle" | "boundary_lead" | "encode_timeout" => {
            value
                .parse::<Duration>()
                .map_err(|e| invalid(e.to_string()))?;
        }
        "notify" => {
            bool_value(key, value)?;
        }
        "art_url_prefix" => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(invalid("Value must be an http(s) URL".to_string()));
            }
        }
        "player" | "media_name" | "combined_sink" | "sink" | "output_dir" => {
            if value.trim().is_empty() {
                return Err(invalid("Value must not be empty".to_string()));
            }
            if key == "combined_sink" && value.contains(char::is_whitespace) {
                return Err(invalid("Sink names cannot contain whitespace".to_string()));
            }
        }
        _ => {}
    }
    Ok(())
}

fn bool_value(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).map_err(|_| ConfigError::ValidationError {
        key: key.to_string(),
        message: "Value must be 'true' or 'false'".to_string(),
    })
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(()),
    }
}
