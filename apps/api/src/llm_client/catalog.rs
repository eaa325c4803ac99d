//! Model catalog: the categorized list of models offered to users.
//!
//! The live list comes from `ModelClient::list_models` and is cached until the
//! next refresh. When listing fails the models configured in the settings file
//! are served instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::ModelEntry;
use crate::llm_client::{ModelClient, ModelSummary};

/// Last-resort default when no model is available at all.
pub const FALLBACK_MODEL_ID: &str = "anthropic.claude-3-5-sonnet-20241022-v2:0";

const PREFERRED_MODELS: [&str; 4] = [
    "anthropic.claude-3-5-sonnet-20241022-v2:0",
    "anthropic.claude-3-sonnet-20240229-v1:0",
    "amazon.nova-pro-v1:0",
    "deepseek.deepseek-v2.5",
];

/// Inference profile ids carry a geography prefix in front of the model id.
const PROFILE_PREFIXES: [&str; 4] = ["us.", "eu.", "apac.", "global."];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    Claude,
    Nova,
    Deepseek,
    Openai,
}

impl ModelCategory {
    pub const ALL: [ModelCategory; 4] = [Self::Claude, Self::Nova, Self::Deepseek, Self::Openai];

    pub fn key(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Nova => "nova",
            Self::Deepseek => "deepseek",
            Self::Openai => "openai",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Claude => "Claude (Anthropic)",
            Self::Nova => "Nova (Amazon)",
            Self::Deepseek => "DeepSeek",
            Self::Openai => "OpenAI",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    pub fn from_model_id(model_id: &str) -> Option<Self> {
        let lower = model_id.to_lowercase();
        if lower.contains("anthropic.claude") {
            Some(Self::Claude)
        } else if lower.contains("amazon.nova") {
            Some(Self::Nova)
        } else if lower.contains("deepseek") {
            Some(Self::Deepseek)
        } else if lower.contains("openai") {
            Some(Self::Openai)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogModel {
    pub model_id: String,
    pub display_name: String,
}

pub type CategorizedModels = BTreeMap<ModelCategory, Vec<CatalogModel>>;

/// Entry in the UI model dropdown. Category separators are disabled entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiModelOption {
    pub value: String,
    pub label: String,
    pub disabled: bool,
}

pub struct ModelCatalog {
    client: Arc<dyn ModelClient>,
    configured: BTreeMap<String, Vec<ModelEntry>>,
    cache: RwLock<Option<CategorizedModels>>,
}

impl ModelCatalog {
    pub fn new(client: Arc<dyn ModelClient>, configured: BTreeMap<String, Vec<ModelEntry>>) -> Self {
        Self {
            client,
            configured,
            cache: RwLock::new(None),
        }
    }

    /// Re-fetches the live model list. Falls back to the configured models on failure.
    pub async fn refresh(&self) -> CategorizedModels {
        let models = match self.client.list_models().await {
            Ok(models) => {
                let categorized = categorize(models);
                info!(
                    "Model catalog refreshed: {} models",
                    categorized.values().map(Vec::len).sum::<usize>()
                );
                categorized
            }
            Err(e) => {
                warn!("Failed to refresh model list, using configured models: {e}");
                self.configured_models()
            }
        };
        *self.cache.write().await = Some(models.clone());
        models
    }

    pub async fn models_by_category(&self) -> CategorizedModels {
        if let Some(models) = self.cache.read().await.as_ref() {
            return models.clone();
        }
        self.refresh().await
    }

    pub async fn is_model_available(&self, model_id: &str) -> bool {
        self.models_by_category()
            .await
            .values()
            .flatten()
            .any(|model| model.model_id == model_id)
    }

    /// First available preferred model, else the first available model.
    pub async fn default_model(&self) -> String {
        let models = self.models_by_category().await;
        let available: Vec<&str> = models
            .values()
            .flatten()
            .map(|m| m.model_id.as_str())
            .collect();

        PREFERRED_MODELS
            .into_iter()
            .find(|preferred| available.contains(preferred))
            .or_else(|| available.first().copied())
            .unwrap_or(FALLBACK_MODEL_ID)
            .to_string()
    }

    pub async fn models_for_ui(&self) -> Vec<UiModelOption> {
        ui_options(&self.models_by_category().await)
    }

    fn configured_models(&self) -> CategorizedModels {
        let mut categorized = CategorizedModels::new();
        for (key, entries) in &self.configured {
            let Some(category) = ModelCategory::from_key(key) else {
                warn!("Ignoring unknown model category in settings: {key}");
                continue;
            };
            categorized.entry(category).or_default().extend(entries.iter().map(|entry| {
                CatalogModel {
                    model_id: entry.id.clone(),
                    display_name: entry.name.clone(),
                }
            }));
        }
        categorized
    }
}

pub fn categorize(models: Vec<ModelSummary>) -> CategorizedModels {
    let mut categorized = CategorizedModels::new();
    for model in models {
        if let Some(category) = ModelCategory::from_model_id(&model.model_id) {
            categorized.entry(category).or_default().push(CatalogModel {
                display_name: display_name(&model.model_id),
                model_id: model.model_id,
            });
        }
    }
    categorized
}

pub fn ui_options(models: &CategorizedModels) -> Vec<UiModelOption> {
    let mut options = Vec::new();
    for (category, entries) in models.iter().filter(|(_, entries)| !entries.is_empty()) {
        options.push(UiModelOption {
            value: format!("---{}---", category.key()),
            label: format!("--- {} ---", category.label()),
            disabled: true,
        });
        options.extend(entries.iter().map(|model| UiModelOption {
            value: model.model_id.clone(),
            label: format!("  {}", model.display_name),
            disabled: false,
        }));
    }
    options
}

// ────────────────────────────────────────────────────────────────────────────
// Display names
// ────────────────────────────────────────────────────────────────────────────

// Ordered: more specific fragments first.
const CLAUDE_NAMES: &[(&str, &str)] = &[
    ("claude-3-5-sonnet-20240620", "Claude 3.5 Sonnet (June)"),
    ("claude-3-5-sonnet-20241022", "Claude 3.5 Sonnet (Oct)"),
    ("claude-3-5-haiku", "Claude 3.5 Haiku"),
    ("claude-3-7-sonnet", "Claude 3.7 Sonnet"),
    ("claude-3-sonnet", "Claude 3 Sonnet"),
    ("claude-3-haiku", "Claude 3 Haiku"),
    ("claude-3-opus", "Claude 3 Opus"),
    ("claude-opus-4-1", "Claude Opus 4.1"),
    ("claude-opus-4", "Claude Opus 4"),
    ("claude-sonnet-4", "Claude Sonnet 4"),
    ("claude-instant", "Claude Instant"),
    ("claude-v2:1", "Claude v2.1"),
    ("claude-v2", "Claude v2"),
];

const NOVA_NAMES: &[(&str, &str)] = &[
    ("nova-pro", "Nova Pro"),
    ("nova-lite", "Nova Lite"),
    ("nova-micro", "Nova Micro"),
    ("nova-premier", "Nova Premier"),
    ("nova-canvas", "Nova Canvas (Image)"),
    ("nova-reel", "Nova Reel (Video)"),
    ("nova-sonic", "Nova Sonic (Audio)"),
];

const DEEPSEEK_NAMES: &[(&str, &str)] = &[
    ("v2.5", "DeepSeek V2.5"),
    ("v3", "DeepSeek V3"),
    ("r1", "DeepSeek R1"),
];

const OPENAI_NAMES: &[(&str, &str)] = &[
    ("gpt-4o", "GPT-4o"),
    ("gpt-oss", "GPT OSS"),
    ("gpt-4", "GPT-4"),
    ("gpt-5", "GPT-5"),
];

/// Human-readable name for a model or inference profile id.
pub fn display_name(model_id: &str) -> String {
    let base = PROFILE_PREFIXES
        .iter()
        .find_map(|prefix| model_id.strip_prefix(prefix))
        .unwrap_or(model_id);
    let lower = base.to_lowercase();

    let (table, family): (&[(&str, &str)], &str) = match ModelCategory::from_model_id(&lower) {
        Some(ModelCategory::Claude) => (CLAUDE_NAMES, "Claude"),
        Some(ModelCategory::Nova) => (NOVA_NAMES, "Nova"),
        Some(ModelCategory::Deepseek) => (DEEPSEEK_NAMES, "DeepSeek"),
        Some(ModelCategory::Openai) => (OPENAI_NAMES, "GPT"),
        None => return friendly_name(base),
    };

    let name = table
        .iter()
        .find(|(fragment, _)| lower.contains(fragment))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| family.to_string());

    match context_window(&lower) {
        Some(window) => format!("{name} ({window})"),
        None => name,
    }
}

/// Context-window variant suffix such as `:200k`, rendered as `200K`.
fn context_window(model_id: &str) -> Option<String> {
    let suffix = model_id.rsplit(':').next()?;
    let digits = suffix.strip_suffix('k')?;
    (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .then(|| format!("{digits}K"))
}

fn friendly_name(model_id: &str) -> String {
    let Some((_, name)) = model_id.rsplit_once('.') else {
        return model_id.to_string();
    };
    let name = name.split(':').next().unwrap_or(name);
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{ConverseRequest, LlmError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubClient {
        models: Option<Vec<&'static str>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelClient for StubClient {
        async fn converse(&self, _request: ConverseRequest<'_>) -> Result<String, LlmError> {
            Err(LlmError::EmptyContent)
        }

        async fn list_models(&self) -> Result<Vec<ModelSummary>, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.models {
                Some(ids) => Ok(ids
                    .iter()
                    .map(|id| ModelSummary {
                        model_id: id.to_string(),
                        model_name: id.to_string(),
                        provider_name: "stub".to_string(),
                        original_model_id: None,
                    })
                    .collect()),
                None => Err(LlmError::MissingCredentials),
            }
        }
    }

    fn stub_catalog(models: Option<Vec<&'static str>>) -> (Arc<StubClient>, ModelCatalog) {
        let client = Arc::new(StubClient {
            models,
            calls: AtomicUsize::new(0),
        });
        let configured = crate::config::AppSettings::default().models;
        (client.clone(), ModelCatalog::new(client, configured))
    }

    #[test]
    fn test_display_names() {
        assert_eq!(
            display_name("us.anthropic.claude-3-7-sonnet-20250219-v1:0"),
            "Claude 3.7 Sonnet"
        );
        assert_eq!(
            display_name("anthropic.claude-3-sonnet-20240229-v1:0:200k"),
            "Claude 3 Sonnet (200K)"
        );
        assert_eq!(display_name("anthropic.claude-opus-4-1-20250805-v1:0"), "Claude Opus 4.1");
        assert_eq!(display_name("amazon.nova-pro-v1:0:300k"), "Nova Pro (300K)");
        assert_eq!(display_name("deepseek.r1-v1:0"), "DeepSeek R1");
        assert_eq!(display_name("openai.gpt-4o-2024-08-06"), "GPT-4o");
        assert_eq!(display_name("cohere.command-r-plus-v1:0"), "Command R Plus V1");
        assert_eq!(display_name("plainid"), "plainid");
    }

    #[test]
    fn test_categorize_drops_unknown_providers() {
        let categorized = categorize(vec![ModelSummary {
            model_id: "meta.llama3-1-8b-instruct-v1:0".to_string(),
            model_name: String::new(),
            provider_name: String::new(),
            original_model_id: None,
        }]);
        assert!(categorized.is_empty());
    }

    #[tokio::test]
    async fn test_ui_options_have_separators_in_category_order() {
        let (_, catalog) = stub_catalog(Some(vec![
            "openai.gpt-4o-2024-08-06",
            "amazon.nova-lite-v1:0",
            "anthropic.claude-3-haiku-20240307-v1:0",
        ]));
        let options = catalog.models_for_ui().await;
        let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(
            values,
            vec![
                "---claude---",
                "anthropic.claude-3-haiku-20240307-v1:0",
                "---nova---",
                "amazon.nova-lite-v1:0",
                "---openai---",
                "openai.gpt-4o-2024-08-06",
            ]
        );
        assert!(options[0].disabled);
        assert_eq!(options[0].label, "--- Claude (Anthropic) ---");
        assert_eq!(options[1].label, "  Claude 3 Haiku");
        assert!(!options[1].disabled);
    }

    #[tokio::test]
    async fn test_catalog_is_cached_until_refresh() {
        let (client, catalog) = stub_catalog(Some(vec!["amazon.nova-pro-v1:0"]));
        assert!(catalog.is_model_available("amazon.nova-pro-v1:0").await);
        assert!(!catalog.is_model_available("amazon.nova-lite-v1:0").await);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        catalog.refresh().await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_listing_failure_uses_configured_models() {
        let (_, catalog) = stub_catalog(None);
        let models = catalog.models_by_category().await;
        assert_eq!(models.len(), 4);
        assert!(catalog.is_model_available("deepseek.deepseek-v2.5").await);
        assert_eq!(
            models[&ModelCategory::Nova][0].display_name,
            "Nova Pro"
        );
    }

    #[tokio::test]
    async fn test_default_model_prefers_known_models() {
        let (_, catalog) = stub_catalog(None);
        // configured defaults do not include 3.5 Sonnet, so the next preference wins
        assert_eq!(
            catalog.default_model().await,
            "anthropic.claude-3-sonnet-20240229-v1:0"
        );

        let (_, catalog) = catalog_with(vec!["openai.gpt-4o-2024-08-06"]);
        assert_eq!(catalog.default_model().await, "openai.gpt-4o-2024-08-06");

        let (_, catalog) = catalog_with(Vec::new());
        assert_eq!(catalog.default_model().await, FALLBACK_MODEL_ID);
    }

    fn catalog_with(ids: Vec<&'static str>) -> (Arc<StubClient>, ModelCatalog) {
        stub_catalog(Some(ids))
    }
}
