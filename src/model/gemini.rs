//! Gemini generateContent client.
//!
//! Request/response shape:
//! - `contents[0].parts` carries the rendered prompt: `text` parts and
//!   `inlineData` parts for media.
//! - `generationConfig` carries `responseModalities` and, for structured
//!   output, `responseMimeType` plus an OpenAPI-style `responseSchema`.
//! - `safetySettings` lists per-category thresholds.
//! - The API key goes in the `x-goog-api-key` header.
//! - Response: `candidates[0].content.parts[*]` (`text` or `inlineData`),
//!   `finishReason`, `promptFeedback.blockReason`, `usageMetadata`.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Proxy;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{Error, ErrorContext};
use crate::media::DataUri;
use crate::prompt::PromptPart;
use crate::schema::{FieldType, ObjectSchema};
use crate::Result;

use super::classify::{retry_after_ms, ServiceErrorClass};
use super::{HarmCategory, ModelClient, ModelRequest, ModelResponse, UsageInfo};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Finish reasons that mean the candidate was suppressed by a safety filter.
const BLOCKED_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "IMAGE_SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
];

/// Client for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiClientBuilder {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    proxy_url: Option<String>,
}

impl Default for GeminiClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            proxy_url: None,
        }
    }
}

impl GeminiClientBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Upper bound for one call, connection to last byte.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    pub fn build(self) -> Result<GeminiClient> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Some(proxy_url) = &self.proxy_url {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    format!("Invalid proxy URL: {}", e),
                    ErrorContext::new()
                        .with_field_path("proxy_url")
                        .with_source("gemini_client"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let http = builder.build().map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to build HTTP client: {}", e),
                ErrorContext::new().with_source("gemini_client"),
            )
        })?;

        Ok(GeminiClient {
            http,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key.filter(|k| !k.trim().is_empty()),
            timeout: self.timeout,
        })
    }
}

impl GeminiClient {
    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::default()
    }

    /// Build from process settings. A missing API key is reported on the first
    /// call, so flows can still be listed and described without one.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut builder = Self::builder()
            .base_url(settings.base_url.clone())
            .timeout(settings.timeout());
        if let Some(key) = &settings.api_key {
            builder = builder.api_key(key.clone());
        }
        if let Some(proxy) = &settings.proxy_url {
            builder = builder.proxy(proxy.clone());
        }
        builder.build()
    }

    fn endpoint(&self, model_id: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, model_id
        )
    }

    async fn exchange(&self, url: &str, api_key: &str, body: &Value) -> Result<Value> {
        let start = Instant::now();
        let resp = self
            .http
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let retry_after_ms = retry_after_ms(resp.headers());
            let text = resp.text().await.unwrap_or_default();
            let err = error_from_body(status, &text, retry_after_ms);
            if let Error::ModelService { class, .. } = &err {
                info!(
                    http_status = status,
                    error_class = class.as_str(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "gemini request failed"
                );
            }
            return Err(err);
        }

        let json = resp.json::<Value>().await.map_err(transport_error)?;
        debug!(
            http_status = status,
            duration_ms = start.elapsed().as_millis() as u64,
            "gemini request succeeded"
        );
        Ok(json)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelResponse> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            Error::configuration_with_context(
                "Missing API key for Gemini",
                ErrorContext::new()
                    .with_field_path("api_key")
                    .with_details("set GEMINI_API_KEY or GOOGLE_API_KEY")
                    .with_source("gemini_client"),
            )
        })?;

        let url = self.endpoint(request.config.model_id());
        let body = build_request_body(request);
        debug!(
            model = request.config.model_id(),
            parts = request.prompt.parts.len(),
            structured = request.output_schema.is_some(),
            "sending gemini request"
        );

        let json = tokio::time::timeout(self.timeout, self.exchange(&url, api_key, &body))
            .await
            .map_err(|_| {
                Error::model_service(
                    ServiceErrorClass::Timeout,
                    format!("no response within {}s", self.timeout.as_secs()),
                )
            })??;

        parse_response(&json)
    }
}

/// Build the `generateContent` request body.
pub(crate) fn build_request_body(request: &ModelRequest<'_>) -> Value {
    let parts: Vec<Value> = request
        .prompt
        .parts
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => json!({ "text": text }),
            PromptPart::Media(media) => json!({
                "inlineData": {
                    "mimeType": media.mime_type(),
                    "data": media.data(),
                }
            }),
        })
        .collect();

    let mut generation_config = Map::new();
    generation_config.insert(
        "responseModalities".into(),
        json!(request
            .config
            .modalities
            .iter()
            .map(|m| m.gemini_name())
            .collect::<Vec<_>>()),
    );
    if let Some(schema) = request.output_schema {
        generation_config.insert("responseMimeType".into(), json!("application/json"));
        generation_config.insert("responseSchema".into(), response_schema(schema));
    }

    let mut body = json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": generation_config,
    });

    if !request.config.safety.is_empty() {
        body["safetySettings"] = request
            .config
            .safety
            .iter()
            .map(|(category, threshold)| {
                json!({
                    "category": category.as_api_str(),
                    "threshold": threshold.as_api_str(),
                })
            })
            .collect::<Vec<_>>()
            .into();
    }
    body
}

/// Convert an object schema to Gemini's OpenAPI-subset `responseSchema`.
fn response_schema(schema: &ObjectSchema) -> Value {
    let mut properties = Map::new();
    for field in schema.fields() {
        let mut prop = field_schema(&field.ty);
        if let (Some(desc), Value::Object(obj)) = (&field.description, &mut prop) {
            obj.insert("description".into(), json!(desc));
        }
        properties.insert(field.name.clone(), prop);
    }
    let required: Vec<&str> = schema
        .fields()
        .iter()
        .filter(|f| f.required)
        .map(|f| f.name.as_str())
        .collect();
    let ordering: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
        "propertyOrdering": ordering,
    })
}

fn field_schema(ty: &FieldType) -> Value {
    match ty {
        FieldType::String { .. } | FieldType::Media { .. } => json!({ "type": "STRING" }),
        FieldType::Number {
            minimum,
            maximum,
            integer,
            ..
        } => {
            let mut map = Map::new();
            map.insert(
                "type".into(),
                json!(if *integer { "INTEGER" } else { "NUMBER" }),
            );
            if let Some(min) = minimum {
                map.insert("minimum".into(), json!(min));
            }
            if let Some(max) = maximum {
                map.insert("maximum".into(), json!(max));
            }
            map.into()
        }
        FieldType::Boolean => json!({ "type": "BOOLEAN" }),
        FieldType::Array {
            items,
            min_items,
            max_items,
        } => {
            let mut map = Map::new();
            map.insert("type".into(), json!("ARRAY"));
            map.insert("items".into(), field_schema(items));
            if let Some(n) = min_items {
                map.insert("minItems".into(), json!(n));
            }
            if let Some(n) = max_items {
                map.insert("maxItems".into(), json!(n));
            }
            map.into()
        }
        FieldType::Object(inner) => response_schema(inner),
    }
}

/// Parse a successful `generateContent` response body.
pub(crate) fn parse_response(body: &Value) -> Result<ModelResponse> {
    // Prompt-level block: no candidates at all.
    if let Some(reason) = body
        .pointer("/promptFeedback/blockReason")
        .and_then(|v| v.as_str())
    {
        return Err(Error::ContentBlocked {
            category: blocking_category(body.pointer("/promptFeedback/safetyRatings")),
            reason: reason.to_string(),
        });
    }

    let candidate = body.pointer("/candidates/0").ok_or_else(|| {
        Error::malformed_output("model returned no candidates", Some(body.to_string()))
    })?;

    let finish_reason = candidate
        .get("finishReason")
        .and_then(|v| v.as_str())
        .map(String::from);
    if let Some(reason) = finish_reason.as_deref() {
        if BLOCKED_FINISH_REASONS.contains(&reason) {
            return Err(Error::ContentBlocked {
                category: blocking_category(candidate.get("safetyRatings")),
                reason: reason.to_string(),
            });
        }
    }

    let mut text = String::new();
    let mut media = Vec::new();
    let parts = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .map(|p| p.as_slice())
        .unwrap_or_default();
    for part in parts {
        if part.get("thought").and_then(|t| t.as_bool()) == Some(true) {
            continue;
        }
        if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
            text.push_str(t);
        }
        if let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) {
            let mime = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(|m| m.as_str());
            let data = inline.get("data").and_then(|d| d.as_str());
            if let (Some(mime), Some(data)) = (mime, data) {
                media.push(DataUri::from_base64(mime, data));
            }
        }
    }

    let usage = body.get("usageMetadata").map(|u| UsageInfo {
        prompt_tokens: u["promptTokenCount"].as_u64().unwrap_or(0),
        completion_tokens: u["candidatesTokenCount"].as_u64().unwrap_or(0),
        total_tokens: u["totalTokenCount"].as_u64().unwrap_or(0),
    });

    Ok(ModelResponse {
        text: (!text.is_empty()).then_some(text),
        media,
        finish_reason,
        usage,
        raw: body.clone(),
    })
}

/// The rating marked `blocked`, else the one with the highest probability.
fn blocking_category(ratings: Option<&Value>) -> Option<HarmCategory> {
    let ratings = ratings?.as_array()?;
    let category_of = |r: &Value| {
        r.get("category")
            .and_then(|c| c.as_str())
            .and_then(HarmCategory::from_api)
    };

    if let Some(blocked) = ratings
        .iter()
        .find(|r| r.get("blocked").and_then(|b| b.as_bool()) == Some(true))
    {
        return category_of(blocked);
    }

    ratings
        .iter()
        .filter_map(|r| {
            let rank = match r.get("probability").and_then(|p| p.as_str())? {
                "HIGH" => 3,
                "MEDIUM" => 2,
                "LOW" => 1,
                _ => return None,
            };
            Some((rank, category_of(r)?))
        })
        .max_by_key(|(rank, _)| *rank)
        .map(|(_, category)| category)
}

fn error_from_body(status: u16, body: &str, retry_after_ms: Option<u32>) -> Error {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.pointer("/error/message"))
        .and_then(|m| m.as_str())
        .map(String::from)
        .unwrap_or_else(|| body.trim().to_string());
    let class = parsed
        .as_ref()
        .and_then(|v| v.pointer("/error/status"))
        .and_then(|s| s.as_str())
        .and_then(|s| ServiceErrorClass::from_rpc_status(s, &message))
        .unwrap_or_else(|| ServiceErrorClass::from_http_status(status));

    Error::ModelService {
        class,
        status: Some(status),
        message,
        retry_after_ms,
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    let class = if e.is_timeout() {
        ServiceErrorClass::Timeout
    } else if e.is_decode() {
        ServiceErrorClass::ServerError
    } else {
        ServiceErrorClass::Network
    };
    Error::model_service(class, e.to_string())
}
