use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

use crate::{sync::SyncSettings, transport::ReconnectPolicy};

pub const DEFAULT_CONFIG_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub data_dir: PathBuf,
    pub optimistic_send: bool,
    pub notification_preview_chars: usize,
    pub reconnect_initial_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:5000/ws".into(),
            data_dir: PathBuf::from(".chat_client"),
            optimistic_send: false,
            notification_preview_chars: 80,
            reconnect_initial_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
        }
    }
}

impl ClientSettings {
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            optimistic_send: self.optimistic_send,
            notification_preview_chars: self.notification_preview_chars,
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.reconnect_initial_delay_ms),
            max_delay: Duration::from_millis(
                self.reconnect_max_delay_ms
                    .max(self.reconnect_initial_delay_ms),
            ),
        }
    }

    fn merge_file(&mut self, file: FileSettings) {
        if let Some(v) = file.server_url {
            self.server_url = v;
        }
        if let Some(v) = file.data_dir {
            self.data_dir = v;
        }
        if let Some(v) = file.optimistic_send {
            self.optimistic_send = v;
        }
        if let Some(v) = file.notification_preview_chars {
            self.notification_preview_chars = v;
        }
        if let Some(v) = file.reconnect_initial_delay_ms {
            self.reconnect_initial_delay_ms = v;
        }
        if let Some(v) = file.reconnect_max_delay_ms {
            self.reconnect_max_delay_ms = v;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    data_dir: Option<PathBuf>,
    optimistic_send: Option<bool>,
    notification_preview_chars: Option<usize>,
    reconnect_initial_delay_ms: Option<u64>,
    reconnect_max_delay_ms: Option<u64>,
}

/// Defaults, then the TOML file, then environment overrides. An explicit
/// `path` must exist; the default `client.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ClientSettings> {
    load_settings_with_env(path, |name| std::env::var(name).ok())
}

pub fn load_settings_with_env(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();
    if let Some(home) = env("HOME").filter(|v| !v.trim().is_empty()) {
        settings.data_dir = PathBuf::from(home).join(".chat_client");
    }

    let (file_path, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(file_path) {
        Ok(raw) => {
            let file: FileSettings = toml::from_str(&raw).with_context(|| {
                format!("invalid settings file '{}'", file_path.display())
            })?;
            settings.merge_file(file);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {}
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to read settings file '{}'", file_path.display())
            })
        }
    }

    if let Some(v) = env("CHAT_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = env("CHAT_DATA_DIR") {
        settings.data_dir = PathBuf::from(v);
    }
    if let Some(v) = env("APP__DATA_DIR") {
        settings.data_dir = PathBuf::from(v);
    }

    if let Some(v) = env("APP__OPTIMISTIC_SEND") {
        settings.optimistic_send = parse_flag(&v)
            .with_context(|| format!("invalid APP__OPTIMISTIC_SEND value '{v}'"))?;
    }

    if let Some(v) = env("APP__RECONNECT_MAX_DELAY_MS") {
        settings.reconnect_max_delay_ms = v
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid APP__RECONNECT_MAX_DELAY_MS value '{v}'"))?;
    }

    settings.server_url = normalize_server_url(&settings.server_url)?;
    Ok(settings)
}

/// Accepts `ws(s)://` as is and rewrites `http(s)://` to the websocket scheme.
pub fn normalize_server_url(raw: &str) -> anyhow::Result<String> {
    let mut url =
        Url::parse(raw.trim()).with_context(|| format!("invalid server url '{raw}'"))?;
    let scheme = match url.scheme() {
        "ws" | "wss" => return Ok(url.to_string()),
        "http" => "ws",
        "https" => "wss",
        other => bail!("server url must use ws, wss, http or https, got '{other}'"),
    };
    if url.set_scheme(scheme).is_err() {
        bail!("cannot rewrite server url '{raw}' to {scheme}");
    }
    Ok(url.to_string())
}

fn parse_flag(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected a boolean"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
