//! Application-level configuration loading, including the live-session policies.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_LIVE_BACK_CONFIG_PATH";

/// Fallback answer window when the quiz record does not carry one.
const DEFAULT_QUESTION_TIME_LIMIT_SECS: u64 = 30;
/// Join codes are short enough to type from a projector slide.
const DEFAULT_JOIN_CODE_LENGTH: usize = 6;
/// Sessions idle for longer than this are evicted by the sweeper.
const DEFAULT_IDLE_SESSION_TTL_SECS: u64 = 3_600;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Answer window applied when the quiz does not specify its own.
    pub question_time_limit_secs: u64,
    /// Whether an admin may force-start a session with an empty roster.
    ///
    /// Observed operator behavior: participants can be live on the transport
    /// before the roster reflects them, so the override stays available
    /// unless explicitly disabled.
    pub allow_force_start: bool,
    /// Whether a transport disconnect removes the participant from the
    /// roster. Default keeps participants by logical id across reconnects.
    pub remove_on_disconnect: bool,
    /// Number of characters in generated join codes.
    pub join_code_length: usize,
    /// Idle time after which the sweeper evicts a session.
    pub idle_session_ttl_secs: u64,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        time_limit = app_config.question_time_limit_secs,
                        force_start = app_config.allow_force_start,
                        "loaded session policies from config"
                    );
                    app_config
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
        }
    }

    /// Idle eviction threshold as a [`Duration`].
    pub fn idle_session_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_session_ttl_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            question_time_limit_secs: DEFAULT_QUESTION_TIME_LIMIT_SECS,
            allow_force_start: true,
            remove_on_disconnect: false,
            join_code_length: DEFAULT_JOIN_CODE_LENGTH,
            idle_session_ttl_secs: DEFAULT_IDLE_SESSION_TTL_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    question_time_limit_secs: Option<u64>,
    allow_force_start: Option<bool>,
    remove_on_disconnect: Option<bool>,
    join_code_length: Option<usize>,
    idle_session_ttl_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            question_time_limit_secs: value
                .question_time_limit_secs
                .unwrap_or(defaults.question_time_limit_secs),
            allow_force_start: value
                .allow_force_start
                .unwrap_or(defaults.allow_force_start),
            remove_on_disconnect: value
                .remove_on_disconnect
                .unwrap_or(defaults.remove_on_disconnect),
            join_code_length: value.join_code_length.unwrap_or(defaults.join_code_length),
            idle_session_ttl_secs: value
                .idle_session_ttl_secs
                .unwrap_or(defaults.idle_session_ttl_secs),
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
    fn partial_config_keeps_defaults_for_missing_fields() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"allow_force_start": false, "join_code_length": 8}"#).unwrap();
        let config: AppConfig = raw.into();

        assert!(!config.allow_force_start);
        assert_eq!(config.join_code_length, 8);
        assert_eq!(
            config.question_time_limit_secs,
            DEFAULT_QUESTION_TIME_LIMIT_SECS
        );
        assert!(!config.remove_on_disconnect);
    }
}
