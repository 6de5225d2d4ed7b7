use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoxpilotError};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Interpreter collaborator configuration
    #[serde(default)]
    pub interpreter: InterpreterConfig,

    /// Bridge server configuration
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Page snapshot limits
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Web search configuration
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Base URL of the language-understanding service
    #[serde(default = "default_interpreter_url")]
    pub base_url: String,

    /// API key sent with every interpreter request
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_interpreter_timeout")]
    pub timeout_secs: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            base_url: default_interpreter_url(),
            api_key: None,
            timeout_secs: default_interpreter_timeout(),
        }
    }
}

fn default_interpreter_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_interpreter_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Port the bridge WebSocket server listens on
    #[serde(default = "default_bridge_port")]
    pub port: u16,

    /// Per-request timeout for extension round-trips, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: default_bridge_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_bridge_port() -> u16 {
    8719
}

fn default_request_timeout() -> u64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Hard cap on descriptors per snapshot
    #[serde(default = "default_max_elements")]
    pub max_elements: usize,

    /// Maximum descriptor text length before truncation
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,

    /// Maximum attribute value length
    #[serde(default = "default_max_attr_len")]
    pub max_attr_len: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_elements: default_max_elements(),
            max_text_len: default_max_text_len(),
            max_attr_len: default_max_attr_len(),
        }
    }
}

fn default_max_elements() -> usize {
    100
}

fn default_max_text_len() -> usize {
    100
}

fn default_max_attr_len() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search engine endpoint; the query is appended as the `q` parameter
    #[serde(default = "default_search_url")]
    pub url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
        }
    }
}

fn default_search_url() -> String {
    "https://www.google.com/search".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interpreter: InterpreterConfig::default(),
            bridge: BridgeConfig::default(),
            snapshot: SnapshotConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from all sources (file, env, defaults)
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let config: Config = Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()))
            // Merge config file if exists
            .merge(Toml::file(&config_path))
            // Merge environment variables. Double underscore separates the
            // section from the key, so keys containing underscores stay
            // addressable (VOXPILOT_SNAPSHOT__MAX_ELEMENTS).
            .merge(Env::prefixed("VOXPILOT_").split("__"))
            .extract()
            .map_err(|e| VoxpilotError::ConfigError(e.to_string()))?;

        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voxpilot")
            .join("config.toml")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| VoxpilotError::ConfigError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_documented_limits() {
        let config = Config::default();

        assert_eq!(config.snapshot.max_elements, 100);
        assert_eq!(config.snapshot.max_text_len, 100);
        assert_eq!(config.snapshot.max_attr_len, 100);
    }

    #[test]
    fn default_interpreter_points_at_localhost() {
        let config = Config::default();

        assert_eq!(config.interpreter.base_url, "http://localhost:3000");
        assert!(config.interpreter.api_key.is_none());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = Config::default();
        config.interpreter.api_key = Some("secret".to_string());
        config.bridge.port = 9000;

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();

        assert_eq!(parsed.bridge.port, 9000);
        assert_eq!(parsed.interpreter.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let parsed: Config = toml::from_str("[bridge]\nport = 4242\n").unwrap();

        assert_eq!(parsed.bridge.port, 4242);
        assert_eq!(parsed.snapshot.max_elements, 100);
        assert_eq!(parsed.search.url, "https://www.google.com/search");
    }

    #[test]
    fn env_overrides_reach_keys_with_underscores() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("XDG_CONFIG_HOME", jail.directory().display().to_string());
            jail.set_env("HOME", jail.directory().display().to_string());
            jail.set_env("VOXPILOT_SNAPSHOT__MAX_ELEMENTS", "25");
            jail.set_env("VOXPILOT_BRIDGE__PORT", "4501");

            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.snapshot.max_elements, 25);
            assert_eq!(config.bridge.port, 4501);
            Ok(())
        });
    }
}
