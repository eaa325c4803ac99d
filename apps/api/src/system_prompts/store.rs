//! File storage for system prompts.
//!
//! Each prompt lives in `<prompts_folder>/<sanitized name><extension>` wrapped in a
//! small Markdown envelope. Saving a prompt also creates a matching history folder
//! `<history_root>/<sanitized name>` so reference material can be kept per prompt.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::system_prompts::PromptStoreError;

const MAX_NAME_CHARS: usize = 100;
const MAX_CONTENT_CHARS: usize = 50_000;

const CONTENT_MARKER: &str = "## 提示词内容 / Prompt Content";
const USAGE_MARKER: &str = "## 使用说明 / Usage Notes";

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

static ILLEGAL_NAME_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("illegal name pattern is valid")
});
static FOLDER_UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("folder pattern is valid"));
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
static CONTROL_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]").expect("control char pattern is valid")
});

#[derive(Debug, Clone)]
pub struct PromptStore {
    prompts_folder: PathBuf,
    history_root: PathBuf,
    extension: String,
    create_history_folders: bool,
}

impl PromptStore {
    /// Creates the store, making sure the prompts folder exists.
    pub fn new(
        prompts_folder: impl Into<PathBuf>,
        history_root: impl Into<PathBuf>,
        extension: &str,
        create_history_folders: bool,
    ) -> Result<Self, PromptStoreError> {
        let store = Self {
            prompts_folder: prompts_folder.into(),
            history_root: history_root.into(),
            extension: extension.to_string(),
            create_history_folders,
        };
        fs::create_dir_all(&store.prompts_folder).map_err(|e| {
            PromptStoreError::Storage(format!(
                "cannot create prompts folder {}: {e}",
                store.prompts_folder.display()
            ))
        })?;
        Ok(store)
    }

    pub fn exists(&self, name: &str) -> Result<bool, PromptStoreError> {
        Ok(self.prompt_path(name)?.is_file())
    }

    /// Validates and writes a prompt, replacing any existing file.
    pub fn save(&self, name: &str, content: &str) -> Result<(), PromptStoreError> {
        validate_prompt_name(name)?;
        validate_prompt_content(content)?;

        let path = self.prompt_path(name)?;
        fs::write(&path, render_prompt_file(name, content)).map_err(|e| {
            PromptStoreError::Storage(format!("cannot write {}: {e}", path.display()))
        })?;
        debug!("Saved system prompt '{name}' to {}", path.display());

        if self.create_history_folders {
            self.create_history_folder(name)?;
        }
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<String, PromptStoreError> {
        let path = self.prompt_path(name)?;
        if !path.is_file() {
            return Err(PromptStoreError::NotFound(name.to_string()));
        }
        let raw = fs::read_to_string(&path).map_err(|e| {
            PromptStoreError::Storage(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(extract_prompt_content(&raw))
    }

    /// Removes the prompt file. Returns `false` if there was nothing to delete.
    pub fn delete(&self, name: &str) -> Result<bool, PromptStoreError> {
        let path = self.prompt_path(name)?;
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| {
            PromptStoreError::Storage(format!("cannot delete {}: {e}", path.display()))
        })?;
        Ok(true)
    }

    /// Prompt names (file stems), sorted.
    pub fn list(&self) -> Result<Vec<String>, PromptStoreError> {
        let entries = fs::read_dir(&self.prompts_folder).map_err(|e| {
            PromptStoreError::Storage(format!(
                "cannot list {}: {e}",
                self.prompts_folder.display()
            ))
        })?;

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter_map(|path| {
                let file_name = path.file_name()?.to_str()?;
                file_name
                    .strip_suffix(self.extension.as_str())
                    .filter(|stem| !stem.is_empty())
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn history_folder(&self, name: &str) -> PathBuf {
        self.history_root.join(sanitize_folder_name(name))
    }

    pub fn history_root(&self) -> &Path {
        &self.history_root
    }

    fn create_history_folder(&self, name: &str) -> Result<PathBuf, PromptStoreError> {
        let folder = self.history_folder(name);
        fs::create_dir_all(&folder).map_err(|e| {
            warn!("Cannot create history folder {}: {e}", folder.display());
            PromptStoreError::HistoryFolder(format!("{}: {e}", folder.display()))
        })?;
        Ok(folder)
    }

    /// Resolves the on-disk path for `name`, refusing anything outside the prompts folder.
    fn prompt_path(&self, name: &str) -> Result<PathBuf, PromptStoreError> {
        let file_name = format!("{}{}", sanitize_folder_name(name), self.extension);
        let path = self.prompts_folder.join(file_name);

        let base = self.prompts_folder.canonicalize().map_err(|e| {
            PromptStoreError::Storage(format!(
                "cannot resolve {}: {e}",
                self.prompts_folder.display()
            ))
        })?;
        let parent = path
            .parent()
            .and_then(|p| p.canonicalize().ok())
            .unwrap_or_default();
        if parent != base {
            return Err(PromptStoreError::Storage(format!(
                "path {} is outside the prompts folder",
                path.display()
            )));
        }
        Ok(path)
    }
}

pub fn validate_prompt_name(name: &str) -> Result<(), PromptStoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(validation("prompt name cannot be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(validation("prompt name is too long (max 100 characters)"));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(validation("prompt name cannot contain path separators"));
    }
    if ILLEGAL_NAME_CHARS.is_match(name) {
        return Err(validation("prompt name contains illegal characters"));
    }
    if RESERVED_NAMES.contains(&name.to_uppercase().as_str()) {
        return Err(validation("prompt name is a reserved system name"));
    }
    Ok(())
}

pub fn validate_prompt_content(content: &str) -> Result<(), PromptStoreError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(validation("prompt content cannot be empty"));
    }
    if trimmed.chars().count() > MAX_CONTENT_CHARS {
        return Err(validation("prompt content is too long (max 50000 characters)"));
    }
    if CONTROL_CHARS.is_match(content) {
        return Err(validation("prompt content contains control characters"));
    }
    Ok(())
}

/// Maps a prompt name to a safe file/folder name.
pub fn sanitize_folder_name(name: &str) -> String {
    let sanitized = FOLDER_UNSAFE_CHARS.replace_all(name.trim(), "_");
    let sanitized = WHITESPACE_RUN.replace_all(&sanitized, "_");
    let sanitized = sanitized.trim_matches(|c: char| c == '.' || c == '_');
    if sanitized.is_empty() {
        return format!("prompt_{}", Local::now().format("%Y%m%d_%H%M%S"));
    }
    sanitized.to_string()
}

fn render_prompt_file(name: &str, content: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!(
        "# 系统提示词: {name}\n\
         \n\
         ## 创建时间 / Created Time\n\
         {timestamp}\n\
         \n\
         ## 最后修改时间 / Last Modified\n\
         {timestamp}\n\
         \n\
         {CONTENT_MARKER}\n\
         {content}\n\
         \n\
         {USAGE_MARKER}\n\
         此提示词用于指导AI模型的行为和响应风格。\n\
         This prompt is used to guide the AI model's behavior and response style.\n",
        content = content.trim()
    )
}

/// Pulls the prompt body out of its envelope. Files without the content marker
/// are returned whole.
fn extract_prompt_content(raw: &str) -> String {
    let Some(marker) = raw.find(CONTENT_MARKER) else {
        return raw.trim().to_string();
    };
    let body = &raw[marker + CONTENT_MARKER.len()..];
    let body = body.find('\n').map(|idx| &body[idx + 1..]).unwrap_or("");
    let end = body
        .rfind(&format!("\n{USAGE_MARKER}"))
        .unwrap_or(body.len());
    body[..end].trim().to_string()
}

fn validation(message: &str) -> PromptStoreError {
    PromptStoreError::Validation(message.to_string())
}
