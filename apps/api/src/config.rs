use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::summary::prompts::DEFAULT_SYSTEM_PROMPT;

pub const DEFAULT_SETTINGS_PATH: &str = "config.toml";

/// Process-level configuration loaded from environment variables.
/// Everything here has a default; CLI flags override individual fields in `main`.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
    pub settings_path: PathBuf,
    /// Bedrock API key sent as a bearer token.
    pub bedrock_api_key: Option<String>,
    /// Overrides `[bedrock] region` from the settings file when set.
    pub aws_region: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "7860".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            settings_path: optional_env("CASE_SUMMARY_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH)),
            bedrock_api_key: optional_env("AWS_BEARER_TOKEN_BEDROCK"),
            aws_region: optional_env("AWS_REGION"),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Settings file
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize default settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub name: String,
}

/// Application settings read from the TOML settings file.
/// Missing keys take their defaults, so a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub history_folder: PathBuf,
    /// Fallback system prompt when no managed prompt is active.
    pub system_prompt: String,
    pub bedrock: BedrockSettings,
    /// Configured models per category. Used when the live catalog is unavailable.
    pub models: BTreeMap<String, Vec<ModelEntry>>,
    pub app: AppSection,
    pub prompt: PromptSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BedrockSettings {
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub title: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub system_prompts: SystemPromptSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemPromptSettings {
    pub prompts_folder: PathBuf,
    pub active_prompt: String,
    pub auto_create_history_folders: bool,
    pub prompt_file_extension: String,
}

/// Character budgets for prompt assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Upper bound for system prompt + user prompt.
    pub max_prompt_length: usize,
    /// History longer than this is truncated.
    pub history_max_length: usize,
    /// Size the truncated history aims for.
    pub history_target_length: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            history_folder: PathBuf::from("./history_references"),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            bedrock: BedrockSettings::default(),
            models: default_models(),
            app: AppSection::default(),
            prompt: PromptSettings::default(),
        }
    }
}

impl Default for BedrockSettings {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
        }
    }
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            title: "案例总结生成器 / Case Summary Generator".to_string(),
            max_tokens: 4000,
            temperature: 0.7,
            system_prompts: SystemPromptSettings::default(),
        }
    }
}

impl Default for SystemPromptSettings {
    fn default() -> Self {
        Self {
            prompts_folder: PathBuf::from("./system_prompts"),
            active_prompt: "default".to_string(),
            auto_create_history_folders: true,
            prompt_file_extension: ".md".to_string(),
        }
    }
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            max_prompt_length: 32_000,
            history_max_length: 15_000,
            history_target_length: 12_000,
        }
    }
}

fn default_models() -> BTreeMap<String, Vec<ModelEntry>> {
    let entry = |id: &str, name: &str| ModelEntry {
        id: id.to_string(),
        name: name.to_string(),
    };
    BTreeMap::from([
        (
            "claude".to_string(),
            vec![
                entry("anthropic.claude-3-sonnet-20240229-v1:0", "Claude 3 Sonnet"),
                entry("anthropic.claude-3-haiku-20240307-v1:0", "Claude 3 Haiku"),
            ],
        ),
        (
            "nova".to_string(),
            vec![
                entry("amazon.nova-pro-v1:0", "Nova Pro"),
                entry("amazon.nova-lite-v1:0", "Nova Lite"),
            ],
        ),
        (
            "deepseek".to_string(),
            vec![entry("deepseek.deepseek-v2.5", "DeepSeek V2.5")],
        ),
        (
            "openai".to_string(),
            vec![entry("openai.gpt-4o-2024-08-06", "GPT-4o")],
        ),
    ])
}

impl AppSettings {
    /// Loads settings from `path`, writing a default file first if none exists.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            warn!(
                "Settings file not found, creating default: {}",
                path.display()
            );
            Self::default().write(path)?;
        }

        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: AppSettings = toml::from_str(&raw)?;
        settings.validate()?;

        info!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    pub fn write(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.app.max_tokens == 0 {
            return Err(invalid("app.max_tokens must be a positive integer"));
        }
        if !(0.0..=2.0).contains(&self.app.temperature) {
            return Err(invalid("app.temperature must be between 0 and 2"));
        }
        if self.configured_models().next().is_none() {
            return Err(invalid("models must list at least one model"));
        }

        let prompts = &self.app.system_prompts;
        if prompts.active_prompt.trim().is_empty() {
            return Err(invalid("app.system_prompts.active_prompt cannot be empty"));
        }
        if !prompts.prompt_file_extension.starts_with('.') {
            return Err(invalid(
                "app.system_prompts.prompt_file_extension must start with '.'",
            ));
        }

        let budget = &self.prompt;
        if budget.max_prompt_length == 0
            || budget.history_max_length == 0
            || budget.history_target_length == 0
        {
            return Err(invalid("prompt length budgets must be positive"));
        }
        if budget.history_target_length > budget.history_max_length {
            return Err(invalid(
                "prompt.history_target_length cannot exceed prompt.history_max_length",
            ));
        }
        Ok(())
    }

    /// All configured models, flattened in category order.
    pub fn configured_models(&self) -> impl Iterator<Item = &ModelEntry> {
        self.models.values().flatten()
    }
}

fn invalid(message: &str) -> SettingsError {
    SettingsError::Invalid(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let settings = AppSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.prompt.max_prompt_length, 32_000);
        assert_eq!(settings.app.max_tokens, 4000);
        assert_eq!(settings.app.system_prompts.active_prompt, "default");
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let settings = AppSettings::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(settings.bedrock.region, "us-east-1");
        assert_eq!(settings.models.len(), 4);

        // reloading the written file yields the same values
        let reloaded = AppSettings::load(&path).unwrap();
        assert_eq!(reloaded.app.title, settings.app.title);
        assert_eq!(reloaded.prompt, settings.prompt);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "history_folder = \"/data/history\"\n\n[app]\nmax_tokens = 1024\n",
        )
        .unwrap();

        let settings = AppSettings::load(&path).unwrap();
        assert_eq!(settings.history_folder, PathBuf::from("/data/history"));
        assert_eq!(settings.app.max_tokens, 1024);
        assert_eq!(settings.app.temperature, 0.7);
        assert_eq!(settings.app.system_prompts.prompt_file_extension, ".md");
    }

    #[test]
    fn test_out_of_range_temperature_rejected() {
        let mut settings = AppSettings::default();
        settings.app.temperature = 2.5;
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_zero_max_tokens_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[app]\nmax_tokens = 0\n").unwrap();
        assert!(matches!(
            AppSettings::load(&path),
            Err(SettingsError::Invalid(_))
        ));
    }

    #[test]
    fn test_extension_without_dot_rejected() {
        let mut settings = AppSettings::default();
        settings.app.system_prompts.prompt_file_extension = "md".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_history_target_above_max_rejected() {
        let mut settings = AppSettings::default();
        settings.prompt.history_target_length = 20_000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_empty_models_rejected() {
        let mut settings = AppSettings::default();
        settings.models.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[app\nmax_tokens = ").unwrap();
        assert!(matches!(
            AppSettings::load(&path),
            Err(SettingsError::Parse(_))
        ));
    }
}
