use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    /// Supports ${ENV_VAR} substitution
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens_per_request: u32,
    /// Timeout knob for the generation request. The core never enforces
    /// timeouts itself; this is handed to the HTTP client.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SandboxConfig {
    /// Luau heap limit for the shared sandbox state.
    #[serde(default = "default_memory_limit_kb")]
    pub memory_limit_kb: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            memory_limit_kb: default_memory_limit_kb(),
        }
    }
}

fn default_max_tokens() -> u32 {
    16000
}

fn default_request_timeout() -> u64 {
    120
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data")
}

fn default_memory_limit_kb() -> usize {
    1024
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Expand environment variables like ${ANTHROPIC_API_KEY}
        let expanded = shellexpand::env(&content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [llm]
        provider = "anthropic"
        model = "claude-sonnet-4-5"
        api_key = "test-key"

        [agent]
        name = "AppForge"
    "#;

    #[test]
    fn test_minimal_config_applies_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.llm.max_tokens_per_request, 16000);
        assert_eq!(config.llm.request_timeout_secs, 120);
        assert_eq!(config.storage.path, PathBuf::from("./data"));
        assert_eq!(config.sandbox.memory_limit_kb, 1024);
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let toml_str = r#"
            [llm]
            provider = "anthropic"
            model = "claude-sonnet-4-5"
            api_key = "k"
            max_tokens_per_request = 4096
            request_timeout_secs = 30

            [agent]
            name = "AppForge"

            [storage]
            path = "/var/lib/appforge"

            [sandbox]
            memory_limit_kb = 2048
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.max_tokens_per_request, 4096);
        assert_eq!(config.llm.request_timeout_secs, 30);
        assert_eq!(config.storage.path, PathBuf::from("/var/lib/appforge"));
        assert_eq!(config.sandbox.memory_limit_kb, 2048);
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("APPFORGE_TEST_KEY", "secret-from-env");
        let content = MINIMAL.replace("test-key", "${APPFORGE_TEST_KEY}");
        let expanded = shellexpand::env(&content).unwrap();
        let config: Config = toml::from_str(&expanded).unwrap();
        assert_eq!(config.llm.api_key, "secret-from-env");
    }
}
