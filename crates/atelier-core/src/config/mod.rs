use crate::error::{AtelierError, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AtelierConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub user: UserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    /// Custom path for the SQLite database. Defaults to `~/.config/atelier/atelier.db`.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable to read the API key from, when
    /// `api_key` is unset and the provider's default variable is not used.
    #[serde(default)]
    pub env_var: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key: None,
            base_url: None,
            env_var: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_port")]
    pub port: u16,
    #[serde(default = "default_web_host")]
    pub host: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            host: default_web_host(),
        }
    }
}

/// Defaults applied to new sessions and to the generation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,
    /// How many prior chat turns are sent for context.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Temperature increase applied when regenerating, to encourage variation.
    #[serde(default = "default_regenerate_bump")]
    pub regenerate_temperature_bump: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_model: default_generation_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            history_window: default_history_window(),
            regenerate_temperature_bump: default_regenerate_bump(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// Identity used for session ownership in single-user deployments.
    #[serde(default)]
    pub id: Option<String>,
}

// -- Defaults --

fn default_storage_backend() -> String {
    "sqlite".to_string()
}
fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    45
}
fn default_web_port() -> u16 {
    38311
}
fn default_web_host() -> String {
    "127.0.0.1".to_string()
}
fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_history_window() -> usize {
    10
}
fn default_regenerate_bump() -> f32 {
    0.1
}

/// Valid completion provider names.
pub const VALID_PROVIDERS: &[&str] = &["openai", "openrouter"];

/// Documented bounds for session settings.
pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
pub const MAX_TOKENS_RANGE: (u32, u32) = (1, 4000);

impl AtelierConfig {
    /// Load configuration with three-layer TOML merge:
    /// 1. ~/.config/atelier/config.toml (global)
    /// 2. .atelier/config.toml (project)
    /// 3. .atelier/config.local.toml (local, gitignored)
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        if let Some(dir) = project_dir {
            let project_config = dir.join(".atelier").join("config.toml");
            if project_config.exists() {
                builder = builder.add_source(File::from(project_config).required(false));
            }

            let local_config = dir.join(".atelier").join("config.local.toml");
            if local_config.exists() {
                builder = builder.add_source(File::from(local_config).required(false));
            }
        }

        let config = builder
            .build()
            .map_err(|e| AtelierError::Config(e.to_string()))?;

        let mut cfg: Self = config
            .try_deserialize()
            .map_err(|e| AtelierError::Config(e.to_string()))?;

        for warning in cfg.validate() {
            tracing::warn!("config: {warning}");
        }
        Ok(cfg)
    }

    /// Load with defaults only (no files).
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Validate config values, clamping out-of-range values and returning
    /// warnings. This is lenient — it fixes values rather than rejecting
    /// the config.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !VALID_PROVIDERS.contains(&self.llm.provider.as_str()) {
            warnings.push(format!(
                "unknown LLM provider '{}', valid: {}",
                self.llm.provider,
                VALID_PROVIDERS.join(", ")
            ));
        }

        if self.llm.timeout_secs == 0 || self.llm.timeout_secs > 600 {
            warnings.push(format!(
                "llm.timeout_secs {} out of range [1, 600], clamping",
                self.llm.timeout_secs
            ));
            self.llm.timeout_secs = self.llm.timeout_secs.clamp(1, 600);
        }

        let (t_min, t_max) = TEMPERATURE_RANGE;
        if !(t_min..=t_max).contains(&self.generation.default_temperature) {
            warnings.push(format!(
                "generation.default_temperature {} out of range [{t_min}, {t_max}], clamping",
                self.generation.default_temperature
            ));
            self.generation.default_temperature =
                self.generation.default_temperature.clamp(t_min, t_max);
        }

        let (m_min, m_max) = MAX_TOKENS_RANGE;
        if !(m_min..=m_max).contains(&self.generation.default_max_tokens) {
            warnings.push(format!(
                "generation.default_max_tokens {} out of range [{m_min}, {m_max}], clamping",
                self.generation.default_max_tokens
            ));
            self.generation.default_max_tokens =
                self.generation.default_max_tokens.clamp(m_min, m_max);
        }

        if self.generation.history_window == 0 {
            warnings.push("generation.history_window must be at least 1, using 1".to_string());
            self.generation.history_window = 1;
        }

        warnings
    }
}

/// Resolve the identity used for session ownership: `ATELIER_USER_ID`
/// env var, then config, then `"local"`.
pub fn resolve_user_id(config: &UserConfig) -> String {
    if let Ok(id) = std::env::var("ATELIER_USER_ID") {
        if !id.is_empty() {
            return id;
        }
    }
    config
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

/// Global config path: `~/.config/atelier/config.toml`
fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("atelier").join("config.toml"))
}

/// Default SQLite path: `~/.config/atelier/atelier.db`
pub fn default_db_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("atelier").join("atelier.db"))
        .ok_or_else(|| AtelierError::Config("cannot determine config directory".to_string()))
}
