/// Model client. The only place that talks to the hosted inference API.
///
/// Uses the Bedrock Converse REST API with an API key sent as a bearer token.
/// Everything else in the service goes through the `ModelClient` trait so tests
/// can swap in a stub.
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod catalog;

pub use catalog::{ModelCatalog, UiModelOption};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_RETRIES: u32 = 3;

/// Model id fragments this service knows how to drive.
pub const SUPPORTED_MODEL_PATTERNS: [&str; 4] =
    ["anthropic.claude", "amazon.nova", "deepseek", "openai"];

const USABLE_INFERENCE_TYPES: [&str; 2] = ["ON_DEMAND", "INFERENCE_PROFILE"];

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Model returned empty content")]
    EmptyContent,

    #[error("No Bedrock API key configured (set AWS_BEARER_TOKEN_BEDROCK)")]
    MissingCredentials,
}

/// One summarization call.
#[derive(Debug, Clone, Copy)]
pub struct ConverseRequest<'a> {
    pub model_id: &'a str,
    pub prompt: &'a str,
    pub system_prompt: &'a str,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// A model the account can invoke.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    /// Id to invoke with. An inference profile id when one covers the model.
    pub model_id: String,
    pub model_name: String,
    pub provider_name: String,
    /// Foundation model id when `model_id` is an inference profile.
    pub original_model_id: Option<String>,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Sends one user message and returns the first text block of the reply.
    async fn converse(&self, request: ConverseRequest<'_>) -> Result<String, LlmError>;

    /// Lists supported models that can be invoked on demand or through a profile.
    async fn list_models(&self) -> Result<Vec<ModelSummary>, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseBody<'a> {
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<TextBlock<'a>>,
    inference_config: InferenceConfig,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<TextBlock<'a>>,
}

#[derive(Debug, Serialize)]
struct TextBlock<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
pub struct ConverseResponse {
    pub output: ConverseOutput,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ConverseOutput {
    #[serde(default)]
    pub message: Option<OutputMessage>,
}

#[derive(Debug, Deserialize)]
pub struct OutputMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl ConverseResponse {
    /// Text of the first text block.
    pub fn text(&self) -> Option<&str> {
        self.output
            .message
            .as_ref()?
            .content
            .iter()
            .find_map(|block| block.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoundationModelsResponse {
    #[serde(default)]
    model_summaries: Vec<FoundationModel>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundationModel {
    pub model_id: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub provider_name: String,
    #[serde(default)]
    pub inference_types_supported: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InferenceProfilesResponse {
    #[serde(default)]
    inference_profile_summaries: Vec<InferenceProfile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceProfile {
    pub inference_profile_id: String,
    #[serde(default)]
    pub models: Vec<ProfileModel>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileModel {
    #[serde(default)]
    pub model_arn: String,
}

#[derive(Debug, Deserialize)]
struct BedrockErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Bedrock client
// ────────────────────────────────────────────────────────────────────────────

/// Bedrock client with retry logic for throttling and server errors.
#[derive(Clone)]
pub struct BedrockClient {
    client: Client,
    region: String,
    api_key: Option<String>,
}

impl BedrockClient {
    pub fn new(region: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            region: region.into(),
            api_key,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn runtime_url(&self, model_id: &str) -> String {
        format!(
            "https://bedrock-runtime.{}.amazonaws.com/model/{}/converse",
            self.region,
            model_id.replace('/', "%2F")
        )
    }

    fn control_url(&self, path: &str) -> String {
        format!("https://bedrock.{}.amazonaws.com/{path}", self.region)
    }

    /// Sends a request built by `build`, retrying 429 and 5xx responses with
    /// exponential backoff, and decodes the JSON body.
    async fn send_json<T, F>(&self, build: F) -> Result<T, LlmError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingCredentials)?;
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Bedrock call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = build(&self.client).bearer_auth(api_key).send().await;
            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Bedrock returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<BedrockErrorBody>(&body)
                    .map(|e| e.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let body = response.text().await?;
            return Ok(serde_json::from_str(&body)?);
        }

        Err(retries_exhausted(last_error))
    }

    /// Maps foundation model ids to inference profile ids. Failures only cost
    /// the substitution, so they are logged and yield an empty map.
    async fn inference_profiles(&self) -> HashMap<String, String> {
        let url = self.control_url("inference-profiles");
        match self
            .send_json::<InferenceProfilesResponse, _>(|client| client.get(&url))
            .await
        {
            Ok(response) => profile_lookup(&response.inference_profile_summaries),
            Err(e) => {
                warn!("Failed to list inference profiles: {e}");
                HashMap::new()
            }
        }
    }
}

#[async_trait]
impl ModelClient for BedrockClient {
    async fn converse(&self, request: ConverseRequest<'_>) -> Result<String, LlmError> {
        let system = request.system_prompt.trim();
        let body = ConverseBody {
            messages: vec![Message {
                role: "user",
                content: vec![TextBlock {
                    text: request.prompt,
                }],
            }],
            system: if system.is_empty() {
                Vec::new()
            } else {
                vec![TextBlock { text: system }]
            },
            inference_config: InferenceConfig {
                max_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        };

        debug!("Invoking model {}", request.model_id);
        let url = self.runtime_url(request.model_id);
        let response: ConverseResponse = self
            .send_json(|client| client.post(&url).json(&body))
            .await?;

        if let Some(usage) = &response.usage {
            debug!(
                "Converse succeeded: input_tokens={}, output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );
        }

        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }

    async fn list_models(&self) -> Result<Vec<ModelSummary>, LlmError> {
        let url = self.control_url("foundation-models");
        let response: FoundationModelsResponse =
            self.send_json(|client| client.get(&url)).await?;
        let profiles = self.inference_profiles().await;

        let models = select_supported_models(response.model_summaries, &profiles);
        info!("Retrieved {} supported models", models.len());
        Ok(models)
    }
}

/// Final error once every attempt failed. Throttling on the last attempt is
/// reported as `RateLimited` rather than a plain API error.
fn retries_exhausted(last_error: Option<LlmError>) -> LlmError {
    match last_error {
        Some(LlmError::Api { status: 429, .. }) | None => LlmError::RateLimited {
            retries: MAX_RETRIES,
        },
        Some(e) => e,
    }
}

pub fn is_supported_model(model_id: &str) -> bool {
    let lower = model_id.to_lowercase();
    SUPPORTED_MODEL_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// Foundation model id → inference profile id, taken from the profile's model ARNs.
pub fn profile_lookup(profiles: &[InferenceProfile]) -> HashMap<String, String> {
    let mut lookup = HashMap::new();
    for profile in profiles {
        for model in &profile.models {
            if let Some((_, model_id)) = model.model_arn.split_once("::foundation-model/") {
                lookup.insert(model_id.to_string(), profile.inference_profile_id.clone());
            }
        }
    }
    lookup
}

/// Keeps supported, invocable models, substituting inference profile ids.
pub fn select_supported_models(
    models: Vec<FoundationModel>,
    profiles: &HashMap<String, String>,
) -> Vec<ModelSummary> {
    models
        .into_iter()
        .filter(|model| is_supported_model(&model.model_id))
        .filter(|model| {
            let usable = model
                .inference_types_supported
                .iter()
                .any(|t| USABLE_INFERENCE_TYPES.contains(&t.as_str()));
            if !usable {
                debug!("Skipping model without usable inference type: {}", model.model_id);
            }
            usable
        })
        .map(|model| match profiles.get(&model.model_id) {
            Some(profile_id) => ModelSummary {
                model_id: profile_id.clone(),
                model_name: model.model_name,
                provider_name: model.provider_name,
                original_model_id: Some(model.model_id),
            },
            None => ModelSummary {
                model_id: model.model_id,
                model_name: model.model_name,
                provider_name: model.provider_name,
                original_model_id: None,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foundation(id: &str, types: &[&str]) -> FoundationModel {
        FoundationModel {
            model_id: id.to_string(),
            model_name: id.to_string(),
            provider_name: "test".to_string(),
            inference_types_supported: types.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_supported_model_patterns() {
        assert!(is_supported_model("anthropic.claude-3-haiku-20240307-v1:0"));
        assert!(is_supported_model("us.amazon.nova-pro-v1:0"));
        assert!(is_supported_model("DeepSeek.r1-v1:0"));
        assert!(!is_supported_model("meta.llama3-1-8b-instruct-v1:0"));
        assert!(!is_supported_model("amazon.titan-text-express-v1"));
    }

    #[test]
    fn test_select_filters_and_substitutes_profiles() {
        let models = vec![
            foundation("anthropic.claude-3-5-sonnet-20241022-v2:0", &["INFERENCE_PROFILE"]),
            foundation("amazon.nova-lite-v1:0", &["ON_DEMAND"]),
            foundation("anthropic.claude-v2", &["PROVISIONED"]),
            foundation("meta.llama3-1-8b-instruct-v1:0", &["ON_DEMAND"]),
        ];
        let profiles = profile_lookup(&[InferenceProfile {
            inference_profile_id: "us.anthropic.claude-3-5-sonnet-20241022-v2:0".to_string(),
            models: vec![ProfileModel {
                model_arn: "arn:aws:bedrock:us-east-1::foundation-model/anthropic.claude-3-5-sonnet-20241022-v2:0".to_string(),
            }],
        }]);

        let selected = select_supported_models(models, &profiles);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].model_id, "us.anthropic.claude-3-5-sonnet-20241022-v2:0");
        assert_eq!(
            selected[0].original_model_id.as_deref(),
            Some("anthropic.claude-3-5-sonnet-20241022-v2:0")
        );
        assert_eq!(selected[1].model_id, "amazon.nova-lite-v1:0");
        assert!(selected[1].original_model_id.is_none());
    }

    #[test]
    fn test_profile_lookup_ignores_non_foundation_arns() {
        let lookup = profile_lookup(&[InferenceProfile {
            inference_profile_id: "profile".to_string(),
            models: vec![ProfileModel {
                model_arn: "arn:aws:bedrock:us-east-1:123:custom-model/abc".to_string(),
            }],
        }]);
        assert!(lookup.is_empty());
    }

    #[test]
    fn test_converse_body_shape() {
        let body = ConverseBody {
            messages: vec![Message {
                role: "user",
                content: vec![TextBlock { text: "hello" }],
            }],
            system: vec![TextBlock { text: "be brief" }],
            inference_config: InferenceConfig {
                max_tokens: 4000,
                temperature: 0.5,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["content"][0]["text"], "hello");
        assert_eq!(json["system"][0]["text"], "be brief");
        assert_eq!(json["inferenceConfig"]["maxTokens"], 4000);
        assert_eq!(json["inferenceConfig"]["temperature"], 0.5);
    }

    #[test]
    fn test_empty_system_is_omitted() {
        let body = ConverseBody {
            messages: Vec::new(),
            system: Vec::new(),
            inference_config: InferenceConfig {
                max_tokens: 1,
                temperature: 0.0,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_response_text_from_first_text_block() {
        let response: ConverseResponse = serde_json::from_str(
            r#"{"output":{"message":{"role":"assistant","content":[{"text":"summary"}]}},
                "usage":{"inputTokens":10,"outputTokens":2,"totalTokens":12},
                "stopReason":"end_turn"}"#,
        )
        .unwrap();
        assert_eq!(response.text(), Some("summary"));
        assert_eq!(response.usage.unwrap().output_tokens, 2);
    }

    #[test]
    fn test_response_without_content_has_no_text() {
        let response: ConverseResponse =
            serde_json::from_str(r#"{"output":{"message":{"content":[]}}}"#).unwrap();
        assert!(response.text().is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_request() {
        let client = BedrockClient::new("us-east-1", None);
        let result = client
            .converse(ConverseRequest {
                model_id: "amazon.nova-pro-v1:0",
                prompt: "hi",
                system_prompt: "",
                max_tokens: 10,
                temperature: 0.1,
            })
            .await;
        assert!(matches!(result, Err(LlmError::MissingCredentials)));
    }

    #[test]
    fn test_throttled_final_attempt_is_rate_limited() {
        let error = retries_exhausted(Some(LlmError::Api {
            status: 429,
            message: "Too many requests".to_string(),
        }));
        assert!(matches!(error, LlmError::RateLimited { retries: 3 }));
    }

    #[test]
    fn test_server_error_final_attempt_keeps_api_error() {
        let error = retries_exhausted(Some(LlmError::Api {
            status: 503,
            message: "unavailable".to_string(),
        }));
        assert!(matches!(error, LlmError::Api { status: 503, .. }));
    }

    #[test]
    fn test_runtime_url() {
        let client = BedrockClient::new("eu-west-1", None);
        assert_eq!(
            client.runtime_url("amazon.nova-pro-v1:0"),
            "https://bedrock-runtime.eu-west-1.amazonaws.com/model/amazon.nova-pro-v1:0/converse"
        );
    }
}
