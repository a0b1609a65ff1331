//! 模型调用模块 — 模型客户端抽象与 Gemini 实现
//!
//! Model invocation: the [`ModelClient`] seam every flow calls through, and
//! the Gemini `generateContent` implementation.

mod classify;
mod config;
mod gemini;

use async_trait::async_trait;
use serde_json::Value;

use crate::media::{DataUri, MediaKind, Modality};
use crate::prompt::RenderedPrompt;
use crate::schema::ObjectSchema;
use crate::Result;

pub use classify::ServiceErrorClass;
pub use config::{
    HarmBlockThreshold, HarmCategory, InvocationConfig, ModelConfig, ModelDefaults, SafetyPolicy,
};
pub use gemini::{GeminiClient, GeminiClientBuilder, DEFAULT_BASE_URL};

/// One prompt-and-schema pair to execute.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub prompt: &'a RenderedPrompt,
    /// Schema to guide generation with; `None` for free-form or image output.
    pub output_schema: Option<&'a ObjectSchema>,
    pub config: &'a InvocationConfig,
}

impl<'a> ModelRequest<'a> {
    pub fn new(prompt: &'a RenderedPrompt, config: &'a InvocationConfig) -> Self {
        Self {
            prompt,
            output_schema: None,
            config,
        }
    }

    pub fn with_output_schema(mut self, schema: &'a ObjectSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn modalities(&self) -> &[Modality] {
        &self.config.modalities
    }
}

/// Token usage reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageInfo {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Raw model output, before any flow-level parsing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelResponse {
    /// Concatenated text parts, if any.
    pub text: Option<String>,
    /// Inline media parts, in order.
    pub media: Vec<DataUri>,
    pub finish_reason: Option<String>,
    pub usage: Option<UsageInfo>,
    pub raw: Value,
}

impl ModelResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn from_media(media: DataUri) -> Self {
        Self {
            media: vec![media],
            ..Self::default()
        }
    }

    pub fn with_media(mut self, media: DataUri) -> Self {
        self.media.push(media);
        self
    }

    /// First inline image, if the response carries one.
    pub fn image(&self) -> Option<&DataUri> {
        self.media
            .iter()
            .find(|m| m.kind() == Some(MediaKind::Image))
    }
}

/// A generative model backend.
///
/// Implementations must be shareable across concurrent invocations.
/// Dropping the returned future aborts the call.
#[async_trait]
pub trait ModelClient: Send + Sync + std::fmt::Debug {
    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelResponse>;
}
