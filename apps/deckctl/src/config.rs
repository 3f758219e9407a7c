use std::{collections::HashMap, fs, path::Path};

use deck_client::DEFAULT_UPLOAD_CHUNK_BYTES;
use tracing::warn;

pub const SETTINGS_FILE: &str = "deckctl.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub upload_chunk_bytes: usize,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".into(),
            upload_chunk_bytes: DEFAULT_UPLOAD_CHUNK_BYTES,
            log_filter: "info".into(),
        }
    }
}

/// Defaults, then `deckctl.toml` in the working directory, then environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    apply_file_overrides(&mut settings, Path::new(SETTINGS_FILE));
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub fn apply_file_overrides(settings: &mut Settings, path: &Path) {
    let Ok(raw) = fs::read_to_string(path) else {
        return;
    };
    match toml::from_str::<toml::Table>(&raw) {
        Ok(table) => apply_table(settings, &flatten_table(table)),
        Err(err) => warn!("ignoring unreadable settings file {}: {err}", path.display()),
    }
}

/// Keeps scalar entries as strings so `upload_chunk_bytes = 4096` and `= "4096"` both work.
fn flatten_table(table: toml::Table) -> HashMap<String, String> {
    table
        .into_iter()
        .filter_map(|(key, value)| match value {
            toml::Value::String(v) => Some((key, v)),
            toml::Value::Integer(v) => Some((key, v.to_string())),
            _ => None,
        })
        .collect()
}

fn apply_table(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("api_base_url") {
        settings.api_base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("upload_chunk_bytes") {
        set_chunk_bytes(settings, v);
    }
    if let Some(v) = file_cfg.get("log_filter") {
        settings.log_filter = v.clone();
    }
}

pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("DECKCTL_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("APP__UPLOAD_CHUNK_BYTES") {
        set_chunk_bytes(settings, &v);
    }

    if let Some(v) = lookup("RUST_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

fn set_chunk_bytes(settings: &mut Settings, raw: &str) {
    match raw.trim().parse::<usize>() {
        Ok(0) => settings.upload_chunk_bytes = DEFAULT_UPLOAD_CHUNK_BYTES,
        Ok(parsed) => settings.upload_chunk_bytes = parsed,
        Err(_) => {}
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
