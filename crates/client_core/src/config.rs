use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

pub const SETTINGS_FILE: &str = "rental.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub backend_url: String,
    pub viewer_id: Option<String>,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/rental.db".into(),
            backend_url: "http://127.0.0.1:8080".into(),
            viewer_id: None,
            request_timeout_secs: 15,
            poll_interval_secs: 30,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Defaults, then `rental.toml` in the working directory, then environment.
pub fn load_settings() -> Settings {
    load_settings_from(Some(Path::new(SETTINGS_FILE)), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    file: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(path) = file {
        if let Ok(raw) = fs::read_to_string(path) {
            match toml::from_str::<HashMap<String, String>>(&raw) {
                Ok(file_cfg) => apply_file(&mut settings, &file_cfg),
                Err(error) => warn!(path = %path.display(), %error, "ignoring malformed settings file"),
            }
        }
    }

    for key in ["RENTAL_DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = env(key) {
            settings.database_url = v;
        }
    }
    for key in ["RENTAL_BACKEND_URL", "APP__BACKEND_URL"] {
        if let Some(v) = env(key) {
            settings.backend_url = v;
        }
    }
    for key in ["RENTAL_VIEWER_ID", "APP__VIEWER_ID"] {
        if let Some(v) = env(key) {
            settings.viewer_id = Some(v);
        }
    }
    if let Some(parsed) = env("APP__REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        settings.request_timeout_secs = parsed;
    }
    if let Some(parsed) = env("APP__POLL_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
        settings.poll_interval_secs = parsed;
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("database_url") {
        settings.database_url = v.clone();
    }
    if let Some(v) = file_cfg.get("backend_url") {
        settings.backend_url = v.clone();
    }
    if let Some(v) = file_cfg.get("viewer_id") {
        settings.viewer_id = Some(v.clone());
    }
    if let Some(parsed) = file_cfg
        .get("request_timeout_secs")
        .and_then(|v| v.parse().ok())
    {
        settings.request_timeout_secs = parsed;
    }
    if let Some(parsed) = file_cfg
        .get("poll_interval_secs")
        .and_then(|v| v.parse().ok())
    {
        settings.poll_interval_secs = parsed;
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    let path = database_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or_default();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
