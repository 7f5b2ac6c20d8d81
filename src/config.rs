use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::conversation::DEFAULT_BRANCH_TEMPLATE;
use crate::provider::Provider;

pub const DEFAULT_API_URL: &str = "http://localhost:3001";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_CLOSE_GRACE_MS: u64 = 300;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub api_url: Option<String>,
    pub ollama_url: Option<String>,
    pub claude_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub branch_template: Option<String>,
    pub close_grace_ms: Option<u64>,
    pub log_filter: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::Relay.as_str().to_string()),
            ..Self::default()
        }
    }

    /// Reads `path`, or returns defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("branchchat").join("config.json"))
    }

    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::parse)
            .unwrap_or_default()
    }

    pub fn model(&self) -> String {
        self.default_model
            .clone()
            .unwrap_or_else(|| self.provider().default_model().to_string())
    }

    pub fn api_url(&self) -> String {
        first_set(
            std::env::var("BRANCHCHAT_API_URL").ok(),
            self.api_url.as_ref(),
        )
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn ollama_url(&self) -> String {
        self.ollama_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
    }

    /// Environment first, then the config file.
    pub fn openai_api_key(&self) -> Option<String> {
        first_set(std::env::var("OPENAI_API_KEY").ok(), self.openai_api_key.as_ref())
    }

    pub fn claude_api_key(&self) -> Option<String> {
        first_set(std::env::var("ANTHROPIC_API_KEY").ok(), self.claude_api_key.as_ref())
    }

    pub fn branch_template(&self) -> String {
        self.branch_template
            .clone()
            .unwrap_or_else(|| DEFAULT_BRANCH_TEMPLATE.to_string())
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms.unwrap_or(DEFAULT_CLOSE_GRACE_MS))
    }
}

fn first_set(env: Option<String>, file: Option<&String>) -> Option<String> {
    env.filter(|v| !v.trim().is_empty())
        .or_else(|| file.filter(|v| !v.trim().is_empty()).cloned())
}
