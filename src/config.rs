use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dirs;
use crate::error::{PlaygroundError, Result};
use crate::upstream::SecretString;

/// User-configurable settings for the relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaygroundConfig {
    /// Host address for the HTTP server (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for the HTTP server (default: 11436)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upstream completions API the relay forwards to
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Where and how the relay reaches the completions API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the bearer credential.
    /// The credential itself never lives in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    11436
}

fn default_base_url() -> String {
    "https://api.two.ai/v2".to_string()
}

fn default_model() -> String {
    "sutra-v2".to_string()
}

fn default_api_key_env() -> String {
    "SUTRA_API_KEY".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl UpstreamConfig {
    /// Read the upstream credential from the configured environment variable.
    pub fn api_key(&self) -> Result<SecretString> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(SecretString::new(key)),
            _ => Err(PlaygroundError::Config(format!(
                "environment variable {} is not set",
                self.api_key_env
            ))),
        }
    }
}

impl PlaygroundConfig {
    /// Load configuration from the default config file path.
    /// Returns default config if the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&dirs::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlaygroundError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: PlaygroundConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save the current configuration to the default config file path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&dirs::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the server bind address string (e.g., "127.0.0.1:11436").
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlaygroundConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 11436);
        assert_eq!(config.upstream.base_url, "https://api.two.ai/v2");
        assert_eq!(config.upstream.model, "sutra-v2");
        assert_eq!(config.upstream.api_key_env, "SUTRA_API_KEY");
    }

    #[test]
    fn test_bind_address() {
        let config = PlaygroundConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:11436");
    }

    #[test]
    fn test_config_deserialize_partial() {
        let toml_str = r#"
            port = 8080

            [upstream]
            model = "sutra-r0"
        "#;
        let config: PlaygroundConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream.model, "sutra-r0");
        assert_eq!(config.upstream.base_url, "https://api.two.ai/v2");
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = PlaygroundConfig {
            host: "0.0.0.0".to_string(),
            port: 9999,
            upstream: UpstreamConfig {
                base_url: "http://localhost:9000/v1".to_string(),
                model: "local".to_string(),
                api_key_env: "LOCAL_KEY".to_string(),
            },
        };
        config.save_to(&path).unwrap();

        let loaded = PlaygroundConfig::load_from(&path).unwrap();
        assert_eq!(loaded.host, "0.0.0.0");
        assert_eq!(loaded.port, 9999);
        assert_eq!(loaded.upstream.base_url, "http://localhost:9000/v1");
        assert_eq!(loaded.upstream.model, "local");
        assert_eq!(loaded.upstream.api_key_env, "LOCAL_KEY");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlaygroundConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.port, 11436);
    }

    #[test]
    fn test_api_key_from_env() {
        let upstream = UpstreamConfig {
            api_key_env: "A3S_PLAYGROUND_TEST_KEY_PRESENT".to_string(),
            ..UpstreamConfig::default()
        };
        std::env::set_var("A3S_PLAYGROUND_TEST_KEY_PRESENT", "sk-test");
        assert_eq!(upstream.api_key().unwrap().expose(), "sk-test");
        std::env::remove_var("A3S_PLAYGROUND_TEST_KEY_PRESENT");
    }

    #[test]
    fn test_api_key_missing() {
        let upstream = UpstreamConfig {
            api_key_env: "A3S_PLAYGROUND_TEST_KEY_ABSENT".to_string(),
            ..UpstreamConfig::default()
        };
        let err = upstream.api_key().unwrap_err();
        assert!(err.to_string().contains("A3S_PLAYGROUND_TEST_KEY_ABSENT"));
    }
}
