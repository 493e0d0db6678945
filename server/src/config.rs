use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use crate::engine::chat_engine::{DEFAULT_HISTORY_LIMIT, EngineSettings};
use crate::engine::user_session::DEFAULT_OUTBOUND_QUEUE;

/// Top-level server configuration, loaded from groupchat.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub channels: ChannelSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub web_address: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            web_address: "0.0.0.0:3000".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChannelSection {
    /// Seconds between idle sweeps.
    pub idle_sweep_secs: u64,
    /// Seconds an empty channel must be quiet before eviction. Defaults to the sweep period.
    pub idle_window_secs: Option<u64>,
    /// Max history entries per channel (0 = unbounded).
    pub history_limit: usize,
    /// Outbound queue length per connection.
    pub outbound_queue: usize,
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            idle_sweep_secs: 3600,
            idle_window_secs: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
        }
    }
}

impl ServerConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {path}"))?;
            Self::from_toml(&contents).with_context(|| format!("failed to parse config file {path}"))?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("WEB_ADDRESS") {
            self.server.web_address = v;
        }
        if let Some(v) = var("PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.set_port(port);
        }
        if let Some(v) = var("IDLE_SWEEP_SECS")
            && let Ok(secs) = v.parse()
        {
            self.channels.idle_sweep_secs = secs;
        }
        if let Some(v) = var("IDLE_WINDOW_SECS")
            && let Ok(secs) = v.parse()
        {
            self.channels.idle_window_secs = Some(secs);
        }
        if let Some(v) = var("HISTORY_LIMIT")
            && let Ok(limit) = v.parse()
        {
            self.channels.history_limit = limit;
        }
        if let Some(v) = var("OUTBOUND_QUEUE")
            && let Ok(len) = v.parse()
        {
            self.channels.outbound_queue = len;
        }
    }

    /// Listen on all interfaces at `port`.
    pub fn set_port(&mut self, port: u16) {
        self.server.web_address = format!("0.0.0.0:{port}");
    }

    /// Period of the idle reaper. Never zero.
    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.channels.idle_sweep_secs.max(1))
    }

    pub fn idle_window(&self) -> Duration {
        self.channels
            .idle_window_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.sweep_period())
    }

    /// Convert into the engine's settings.
    pub fn to_engine_settings(&self) -> EngineSettings {
        EngineSettings {
            history_limit: self.channels.history_limit,
            outbound_queue: self.channels.outbound_queue.max(1),
            idle_window: self.idle_window(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.web_address, "0.0.0.0:3000");
        assert_eq!(config.sweep_period(), Duration::from_secs(3600));
        assert_eq!(config.idle_window(), config.sweep_period());
        assert_eq!(config.to_engine_settings().history_limit, 1000);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            [channels]
            idle_sweep_secs = 60
            history_limit = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.server.web_address, "0.0.0.0:3000");
        assert_eq!(config.sweep_period(), Duration::from_secs(60));
        assert_eq!(config.idle_window(), Duration::from_secs(60));
        assert_eq!(config.channels.history_limit, 0);
        assert_eq!(config.channels.outbound_queue, 1024);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(ServerConfig::from_toml("[channels]\nidle_sweep_secs = \"soon\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PORT", "4000"),
            ("IDLE_SWEEP_SECS", "120"),
            ("IDLE_WINDOW_SECS", "30"),
            ("HISTORY_LIMIT", "50"),
            ("OUTBOUND_QUEUE", "not-a-number"),
        ]);
        let mut config = ServerConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.web_address, "0.0.0.0:4000");
        assert_eq!(config.sweep_period(), Duration::from_secs(120));
        assert_eq!(config.idle_window(), Duration::from_secs(30));
        assert_eq!(config.channels.history_limit, 50);
        assert_eq!(config.channels.outbound_queue, 1024);
    }

    #[test]
    fn test_zero_sweep_period_is_clamped() {
        let mut config = ServerConfig::default();
        config.channels.idle_sweep_secs = 0;
        assert_eq!(config.sweep_period(), Duration::from_secs(1));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        assert!(ServerConfig::load("definitely/not/here.toml").is_ok());
    }
}
