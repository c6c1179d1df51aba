//! Configuration for the generation gateway

use serde::{Deserialize, Serialize};

/// Configuration for the remote generation gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the generation gateway
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Abort the stream if no delta arrives within this window
    #[serde(default = "default_inter_token_timeout_ms")]
    pub inter_token_timeout_ms: u64,

    /// System prompt prepended to every turn
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8730".to_string()
}

const fn default_connect_timeout_ms() -> u64 {
    2000
}

const fn default_inter_token_timeout_ms() -> u64 {
    5000
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            inter_token_timeout_ms: default_inter_token_timeout_ms(),
            system_prompt: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let config = GenerationConfig::default();
        assert_eq!(config.inter_token_timeout_ms, 5000);
        assert!(config.system_prompt.is_none());
        assert!(config.base_url.starts_with("http://"));
    }

    #[test]
    fn config_deserializes_with_partial_fields() {
        let json = r#"{"inter_token_timeout_ms":800}"#;
        let config: GenerationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.inter_token_timeout_ms, 800);
        assert_eq!(config.connect_timeout_ms, 2000);
    }
}
