//! TOML configuration.
//!
//! Read from `$ONTASK_CONFIG` or `<config_dir>/ontask/config.toml`. A missing
//! file means defaults everywhere. Secrets may come from the environment
//! instead of the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::kernel::state::{EscalationReset, StrikePolicy};

pub const CONFIG_ENV: &str = "ONTASK_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_30_000")]
    pub strike_after_ms: u64,
    #[serde(default = "default_30_000")]
    pub cooldown_ms: u64,
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: u32,
    #[serde(default)]
    pub escalation_reset: EscalationReset,
    #[serde(default = "default_classify_timeout_ms")]
    pub classify_timeout_ms: u64,
}

/// Conversational agent service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default = "default_agent_model")]
    pub model: String,
}

/// Vision-capable LLM (primary LLM classifier and justification source).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_vision_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_vision_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_true")]
    pub capture_screenshots: bool,
}

/// Text-only fallback LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_fallback_model")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_voice_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub assistant_id: String,
    #[serde(default)]
    pub phone_number_id: String,
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_poll_interval_ms() -> u64 {
    5_000
}
fn default_30_000() -> u64 {
    30_000
}
fn default_escalation_threshold() -> u32 {
    2
}
fn default_classify_timeout_ms() -> u64 {
    20_000
}
fn default_agent_url() -> String {
    "https://api.letta.com".into()
}
fn default_agent_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_vision_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_vision_model() -> String {
    "claude-3-5-sonnet-20241022".into()
}
fn default_max_tokens() -> u32 {
    100
}
fn default_fallback_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_fallback_model() -> String {
    "gemini-pro".into()
}
fn default_voice_url() -> String {
    "https://api.vapi.ai".into()
}
fn default_country_code() -> String {
    "1".into()
}
fn default_true() -> bool {
    true
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            strike_after_ms: default_30_000(),
            cooldown_ms: default_30_000(),
            escalation_threshold: default_escalation_threshold(),
            escalation_reset: EscalationReset::default(),
            classify_timeout_ms: default_classify_timeout_ms(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: default_agent_url(),
            api_key: String::new(),
            project: None,
            agent_id: None,
            model: default_agent_model(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: default_vision_url(),
            api_key: String::new(),
            model: default_vision_model(),
            max_tokens: default_max_tokens(),
            capture_screenshots: true,
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            base_url: default_fallback_url(),
            api_key: String::new(),
            model: default_fallback_model(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_voice_url(),
            api_key: String::new(),
            assistant_id: String::new(),
            phone_number_id: String::new(),
            default_country_code: default_country_code(),
        }
    }
}

impl MonitorConfig {
    pub fn policy(&self) -> StrikePolicy {
        StrikePolicy {
            strike_after: Duration::from_millis(self.strike_after_ms),
            cooldown: Duration::from_millis(self.cooldown_ms),
            escalation_threshold: self.escalation_threshold,
            reset: self.escalation_reset,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn classify_timeout(&self) -> Duration {
        Duration::from_millis(self.classify_timeout_ms)
    }
}

impl AgentConfig {
    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl VisionConfig {
    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl FallbackConfig {
    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl VoiceConfig {
    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty() && !self.assistant_id.is_empty() && !self.phone_number_id.is_empty()
    }
}

impl BackendConfig {
    pub fn is_enabled(&self) -> bool {
        !self.url.is_empty() && !self.anon_key.is_empty()
    }
}

/// Returns `<config_dir>/ontask/`.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("ontask"))
        .ok_or(ConfigError::NoDirectory("config"))
}

/// Returns `<data_dir>/ontask/`.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join("ontask"))
        .ok_or(ConfigError::NoDirectory("data"))
}

impl Config {
    /// Load from `$ONTASK_CONFIG` or the default path, then apply env secrets.
    pub fn load() -> Result<Self, ConfigError> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => config_dir()?.join("config.toml"),
        };
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Fill empty secrets from the environment. `lookup` is injectable for tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fill = |slot: &mut String, key: &str| {
            if slot.is_empty() {
                if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                    *slot = value;
                }
            }
        };
        fill(&mut self.agent.api_key, "ONTASK_AGENT_API_KEY");
        fill(&mut self.vision.api_key, "ONTASK_ANTHROPIC_API_KEY");
        fill(&mut self.fallback.api_key, "ONTASK_GEMINI_API_KEY");
        fill(&mut self.voice.api_key, "ONTASK_VAPI_API_KEY");
        fill(&mut self.backend.anon_key, "ONTASK_SUPABASE_ANON_KEY");
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let monitor = &self.monitor;
        if monitor.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "monitor.poll_interval_ms",
                message: "must be greater than zero".into(),
            });
        }
        if monitor.escalation_threshold == 0 {
            return Err(ConfigError::Invalid {
                key: "monitor.escalation_threshold",
                message: "must be at least 1".into(),
            });
        }
        if monitor.classify_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "monitor.classify_timeout_ms",
                message: "must be greater than zero".into(),
            });
        }
        if !self.voice.default_country_code.chars().all(|c| c.is_ascii_digit())
            || self.voice.default_country_code.is_empty()
        {
            return Err(ConfigError::Invalid {
                key: "voice.default_country_code",
                message: format!("'{}' is not a numeric country code", self.voice.default_country_code),
            });
        }
        Ok(())
    }

    pub fn store_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.store.path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("state.json")),
        }
    }
}
