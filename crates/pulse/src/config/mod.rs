use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PulseError, Result};

/// Main configuration structure for Pulse
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Fallback gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Per-backend configuration
    #[serde(default)]
    pub backends: BackendsConfig,
}

impl Config {
    /// Paths searched, in order, when no config file is given
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::home_dir().map(|h| h.join(".pulse").join("config.toml")),
            dirs::config_dir().map(|c| c.join("pulse").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Load configuration from `path`, else the first default path that
    /// exists, else built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        for candidate in Self::default_paths() {
            if candidate.exists() {
                return Self::from_file(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::info!("Loading config from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            PulseError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content)
            .map_err(|e| PulseError::Config(format!("Failed to parse config: {e}")))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:3210")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3210".to_string()
}

/// Fallback gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Upper bound on a live reachability probe, in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl GatewayConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

/// Configuration for every backend the gateway may call
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendsConfig {
    /// Google Gemini (fast cloud backend)
    #[serde(default)]
    pub gemini: GeminiConfig,
    /// OpenAI-compatible chat completions (cloud backend)
    #[serde(default)]
    pub openai: OpenAiConfig,
    /// Ollama (locally hosted backend)
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// Google Gemini backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Include this backend in the fallback list
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Position in the fallback order (lower is tried first)
    #[serde(default = "default_gemini_priority")]
    pub priority: u32,
    /// API base URL
    #[serde(default = "default_gemini_api_url")]
    pub api_url: String,
    /// Inline API key (takes precedence over `api_key_env`)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable name for API key
    #[serde(default = "default_gemini_api_key_env")]
    pub api_key_env: String,
    /// Model identifier
    #[serde(default = "default_gemini_model")]
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_cloud_timeout_secs")]
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Resolve the API key from the inline value or the named environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref(), &self.api_key_env)
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            priority: default_gemini_priority(),
            api_url: default_gemini_api_url(),
            api_key: None,
            api_key_env: default_gemini_api_key_env(),
            model: default_gemini_model(),
            timeout_secs: default_cloud_timeout_secs(),
        }
    }
}

fn default_gemini_priority() -> u32 {
    1
}

fn default_gemini_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

/// OpenAI-compatible backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Include this backend in the fallback list
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Position in the fallback order (lower is tried first)
    #[serde(default = "default_openai_priority")]
    pub priority: u32,
    /// API base URL (the `/chat/completions` suffix is appended)
    #[serde(default = "default_openai_api_url")]
    pub api_url: String,
    /// Inline API key (takes precedence over `api_key_env`)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable name for API key
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,
    /// Model identifier
    #[serde(default = "default_openai_model")]
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_cloud_timeout_secs")]
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    /// Resolve the API key from the inline value or the named environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref(), &self.api_key_env)
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            priority: default_openai_priority(),
            api_url: default_openai_api_url(),
            api_key: None,
            api_key_env: default_openai_api_key_env(),
            model: default_openai_model(),
            timeout_secs: default_cloud_timeout_secs(),
        }
    }
}

fn default_openai_priority() -> u32 {
    2
}

fn default_openai_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}

/// Ollama backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Include this backend in the fallback list
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Position in the fallback order (lower is tried first)
    #[serde(default = "default_ollama_priority")]
    pub priority: u32,
    /// Base URL of the Ollama server
    #[serde(default = "default_ollama_url")]
    pub url: String,
    /// Model tag to generate with
    #[serde(default = "default_ollama_model")]
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_ollama_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            priority: default_ollama_priority(),
            url: default_ollama_url(),
            model: default_ollama_model(),
            timeout_secs: default_ollama_timeout_secs(),
        }
    }
}

fn default_ollama_priority() -> u32 {
    3
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "phi3:mini".to_string()
}

fn default_ollama_timeout_secs() -> u64 {
    120
}

fn default_enabled() -> bool {
    true
}

fn default_cloud_timeout_secs() -> u64 {
    30
}

fn resolve_api_key(inline: Option<&str>, env_name: &str) -> Option<String> {
    inline
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .or_else(|| env::var(env_name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:3210");
        assert_eq!(config.gateway.probe_timeout_ms, 2000);
        assert_eq!(config.gateway.probe_timeout(), Duration::from_millis(2000));

        assert!(config.backends.gemini.enabled);
        assert_eq!(config.backends.gemini.priority, 1);
        assert_eq!(config.backends.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.backends.gemini.api_key_env, "GEMINI_API_KEY");

        assert_eq!(config.backends.openai.priority, 2);
        assert_eq!(config.backends.openai.api_url, "https://api.openai.com/v1");
        assert_eq!(config.backends.openai.model, "gpt-3.5-turbo");

        assert_eq!(config.backends.ollama.priority, 3);
        assert_eq!(config.backends.ollama.url, "http://localhost:11434");
        assert_eq!(config.backends.ollama.model, "phi3:mini");
        assert_eq!(config.backends.ollama.timeout_secs, 120);
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[server]
listen_addr = "0.0.0.0:8080"

[gateway]
probe_timeout_ms = 500

[backends.gemini]
enabled = false
api_key = "inline-key"

[backends.openai]
priority = 1
api_url = "http://localhost:8000/v1"
api_key_env = "LOCAL_OPENAI_KEY"
model = "llama-3-8b"
timeout_secs = 10

[backends.ollama]
url = "http://gpu-box:11434"
model = "mistral"
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to parse TOML");

        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.gateway.probe_timeout_ms, 500);

        assert!(!config.backends.gemini.enabled);
        assert_eq!(config.backends.gemini.api_key.as_deref(), Some("inline-key"));
        assert_eq!(config.backends.gemini.priority, 1);

        assert_eq!(config.backends.openai.priority, 1);
        assert_eq!(config.backends.openai.api_url, "http://localhost:8000/v1");
        assert_eq!(config.backends.openai.api_key_env, "LOCAL_OPENAI_KEY");
        assert_eq!(config.backends.openai.model, "llama-3-8b");
        assert_eq!(config.backends.openai.timeout_secs, 10);

        assert_eq!(config.backends.ollama.url, "http://gpu-box:11434");
        assert_eq!(config.backends.ollama.model, "mistral");
        assert_eq!(config.backends.ollama.priority, 3);
    }

    #[test]
    fn test_toml_partial_deserialization() {
        let toml_str = r#"
[backends.ollama]
model = "llama3"
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to parse partial TOML");

        assert_eq!(config.server.listen_addr, "127.0.0.1:3210");
        assert_eq!(config.gateway.probe_timeout_ms, 2000);
        assert_eq!(config.backends.ollama.model, "llama3");
        assert_eq!(config.backends.ollama.url, "http://localhost:11434");
        assert!(config.backends.gemini.api_key.is_none());
    }

    #[test]
    fn test_inline_api_key_wins_over_env() {
        unsafe {
            std::env::set_var("PULSE_TEST_INLINE_KEY", "from-env");
        }
        let config = GeminiConfig {
            api_key: Some("from-file".to_string()),
            api_key_env: "PULSE_TEST_INLINE_KEY".to_string(),
            ..GeminiConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("from-file"));
    }

    #[test]
    fn test_blank_inline_api_key_falls_back_to_env() {
        unsafe {
            std::env::set_var("PULSE_TEST_BLANK_KEY", "from-env");
        }
        let config = OpenAiConfig {
            api_key: Some("   ".to_string()),
            api_key_env: "PULSE_TEST_BLANK_KEY".to_string(),
            ..OpenAiConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("from-env"));
    }

    #[test]
    fn test_missing_api_key_resolves_to_none() {
        unsafe {
            std::env::remove_var("PULSE_TEST_MISSING_KEY");
        }
        let config = OpenAiConfig {
            api_key_env: "PULSE_TEST_MISSING_KEY".to_string(),
            ..OpenAiConfig::default()
        };
        assert!(config.resolve_api_key().is_none());
    }

    #[test]
    fn test_load_missing_explicit_path_errors() {
        let err = Config::load(Some(Path::new("/nonexistent/pulse/config.toml"))).unwrap_err();
        assert!(matches!(err, PulseError::Config(_)));
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_default_paths_end_with_working_directory() {
        let paths = Config::default_paths();
        assert_eq!(paths.last(), Some(&PathBuf::from("config.toml")));
    }
}
