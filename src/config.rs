//! Application-level configuration loading, including adapter endpoints and
//! the seed button set.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::registry::{ButtonDefinition, DEFAULT_ICON, default_buttons, derive_button_id};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CS2_RELAY_CONFIG_PATH";
/// Environment variable supplying the snippet API token outside the config file.
const SNIPPET_TOKEN_ENV: &str = "CS2_RELAY_SNIPPET_TOKEN";

/// Default upstream companion endpoint for the local HTTP adapter.
const DEFAULT_LOCAL_API_URL: &str = "http://127.0.0.1:2828/api/local-buttons";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Directory holding the file-store mirror and the command document.
    pub state_dir: PathBuf,
    /// Upstream companion endpoint; `None` disables the local HTTP adapter.
    pub local_api_url: Option<String>,
    /// Connectivity probe interval.
    pub probe_interval: Duration,
    /// Pulse expiry sweep interval.
    pub sweep_interval: Duration,
    /// Remote reconcile poll interval.
    pub reconcile_interval: Duration,
    /// Realtime database backend, when configured.
    pub realtime: Option<RealtimeConfig>,
    /// Snippet-hosting backend, when configured.
    pub snippet: Option<SnippetConfig>,
    /// Buttons seeded when no persisted snapshot can be loaded.
    pub seed_buttons: Vec<ButtonDefinition>,
}

#[derive(Debug, Clone)]
/// Connection settings for the realtime database backend.
pub struct RealtimeConfig {
    /// Database root, e.g. `https://example-default-rtdb.firebaseio.com`.
    pub base_url: String,
    /// Fixed session id; the generated session id is used when absent.
    pub session_id: Option<String>,
}

#[derive(Debug, Clone)]
/// Connection settings for the snippet-hosting backend.
pub struct SnippetConfig {
    /// API root, e.g. `https://api.github.com`.
    pub api_base: String,
    /// Identifier of the shared snippet document, when one already exists.
    pub gist_id: Option<String>,
    /// Bearer token used for create/update calls.
    pub token: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in
    /// defaults when the file is absent or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        buttons = config.seed_buttons.len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Some(snippet) = config.snippet.as_mut()
            && snippet.token.is_none()
            && let Ok(token) = env::var(SNIPPET_TOKEN_ENV)
            && !token.is_empty()
        {
            snippet.token = Some(token);
        }

        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("data"),
            local_api_url: Some(DEFAULT_LOCAL_API_URL.to_string()),
            probe_interval: Duration::from_secs(2),
            sweep_interval: Duration::from_secs(1),
            reconcile_interval: Duration::from_secs(5),
            realtime: None,
            snippet: None,
            seed_buttons: default_buttons(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file.
struct RawConfig {
    state_dir: Option<PathBuf>,
    local_api_url: Option<String>,
    probe_interval_ms: Option<u64>,
    sweep_interval_ms: Option<u64>,
    reconcile_interval_ms: Option<u64>,
    realtime: Option<RawRealtime>,
    snippet: Option<RawSnippet>,
    buttons: Option<Vec<RawButton>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRealtime {
    base_url: String,
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnippet {
    #[serde(default = "default_snippet_api")]
    api_base: String,
    gist_id: Option<String>,
    token: Option<String>,
}

fn default_snippet_api() -> String {
    "https://api.github.com".to_string()
}

#[derive(Debug, Deserialize)]
/// JSON representation of one seed button.
struct RawButton {
    label: String,
    icon: Option<String>,
    page: u32,
    row: u32,
    col: u32,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let seed_buttons = match value.buttons {
            Some(buttons) if !buttons.is_empty() => buttons
                .into_iter()
                .map(|raw| ButtonDefinition {
                    id: derive_button_id(&raw.label),
                    label: raw.label,
                    icon: raw.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
                    page: raw.page,
                    row: raw.row,
                    col: raw.col,
                })
                .collect(),
            _ => defaults.seed_buttons,
        };

        Self {
            state_dir: value.state_dir.unwrap_or(defaults.state_dir),
            local_api_url: value.local_api_url.or(defaults.local_api_url),
            probe_interval: value
                .probe_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.probe_interval),
            sweep_interval: value
                .sweep_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.sweep_interval),
            reconcile_interval: value
                .reconcile_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconcile_interval),
            realtime: value.realtime.map(|raw| RealtimeConfig {
                base_url: raw.base_url,
                session_id: raw.session_id,
            }),
            snippet: value.snippet.map(|raw| SnippetConfig {
                api_base: raw.api_base,
                gist_id: raw.gist_id,
                token: raw.token,
            }),
            seed_buttons,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_config_overrides_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "stateDir": "/tmp/relay",
                "probeIntervalMs": 5000,
                "buttons": [
                    {"label": "Head Shot!", "page": 1, "row": 2, "col": 3}
                ]
            }"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();

        assert_eq!(config.state_dir, PathBuf::from("/tmp/relay"));
        assert_eq!(config.probe_interval, Duration::from_secs(5));
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert_eq!(config.seed_buttons.len(), 1);
        assert_eq!(config.seed_buttons[0].id, "head_shot");
        assert_eq!(config.seed_buttons[0].icon, DEFAULT_ICON);
    }

    #[test]
    fn empty_raw_config_keeps_defaults() {
        let raw: RawConfig = serde_json::from_str("{}").unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.seed_buttons.len(), 6);
        assert_eq!(
            config.local_api_url.as_deref(),
            Some(DEFAULT_LOCAL_API_URL)
        );
    }
}
