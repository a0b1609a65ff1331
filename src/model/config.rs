//! Model selection, response modalities and safety policy.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorContext};
use crate::media::Modality;
use crate::Result;

/// Harm category a safety threshold applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmCategory {
    Harassment,
    HateSpeech,
    SexuallyExplicit,
    DangerousContent,
    CivicIntegrity,
}

impl HarmCategory {
    /// Name used by the Gemini API.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Harassment => "HARM_CATEGORY_HARASSMENT",
            Self::HateSpeech => "HARM_CATEGORY_HATE_SPEECH",
            Self::SexuallyExplicit => "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            Self::DangerousContent => "HARM_CATEGORY_DANGEROUS_CONTENT",
            Self::CivicIntegrity => "HARM_CATEGORY_CIVIC_INTEGRITY",
        }
    }

    pub fn from_api(s: &str) -> Option<Self> {
        match s {
            "HARM_CATEGORY_HARASSMENT" => Some(Self::Harassment),
            "HARM_CATEGORY_HATE_SPEECH" => Some(Self::HateSpeech),
            "HARM_CATEGORY_SEXUALLY_EXPLICIT" => Some(Self::SexuallyExplicit),
            "HARM_CATEGORY_DANGEROUS_CONTENT" => Some(Self::DangerousContent),
            "HARM_CATEGORY_CIVIC_INTEGRITY" => Some(Self::CivicIntegrity),
            _ => None,
        }
    }
}

impl fmt::Display for HarmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// How aggressively a category is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockLowAndAbove,
    BlockMediumAndAbove,
    BlockOnlyHigh,
}

impl HarmBlockThreshold {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::BlockNone => "BLOCK_NONE",
            Self::BlockLowAndAbove => "BLOCK_LOW_AND_ABOVE",
            Self::BlockMediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
            Self::BlockOnlyHigh => "BLOCK_ONLY_HIGH",
        }
    }
}

impl fmt::Display for HarmBlockThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// Per-category block thresholds. Categories not listed use the backend default.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SafetyPolicy(BTreeMap<HarmCategory, HarmBlockThreshold>);

impl SafetyPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: HarmCategory, threshold: HarmBlockThreshold) -> Self {
        self.0.insert(category, threshold);
        self
    }

    pub fn get(&self, category: HarmCategory) -> Option<HarmBlockThreshold> {
        self.0.get(&category).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HarmCategory, HarmBlockThreshold)> + '_ {
        self.0.iter().map(|(c, t)| (*c, *t))
    }

    /// Category-wise merge; entries in `overrides` win.
    pub fn merge(&self, overrides: &SafetyPolicy) -> SafetyPolicy {
        let mut merged = self.0.clone();
        merged.extend(overrides.iter());
        SafetyPolicy(merged)
    }
}

/// Process-wide fallbacks for per-flow model configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefaults {
    pub model: String,
    pub safety: SafetyPolicy,
}

impl ModelDefaults {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            safety: SafetyPolicy::new(),
        }
    }

    pub fn with_safety(mut self, safety: SafetyPolicy) -> Self {
        self.safety = safety;
        self
    }
}

/// Per-flow model configuration, as declared.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// `provider/model` or bare model id; `None` uses the process default.
    pub model: Option<String>,
    pub modalities: Vec<Modality>,
    pub safety: SafetyPolicy,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: None,
            modalities: vec![Modality::Text],
            safety: SafetyPolicy::new(),
        }
    }
}

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn modalities(mut self, modalities: impl IntoIterator<Item = Modality>) -> Self {
        self.modalities = modalities.into_iter().collect();
        self
    }

    pub fn safety(mut self, safety: SafetyPolicy) -> Self {
        self.safety = safety;
        self
    }

    /// Fill gaps from `defaults` and normalise the requested modalities.
    pub fn resolve(&self, defaults: &ModelDefaults) -> Result<InvocationConfig> {
        let model = self
            .model
            .as_deref()
            .unwrap_or(&defaults.model)
            .trim()
            .to_string();
        if model.is_empty() || model.ends_with('/') {
            return Err(Error::configuration_with_context(
                "No model configured",
                ErrorContext::new()
                    .with_field_path("model")
                    .with_details(format!("got '{}'", model))
                    .with_source("model_config"),
            ));
        }

        Ok(InvocationConfig {
            model,
            modalities: normalize_modalities(&self.modalities),
            safety: defaults.safety.merge(&self.safety),
        })
    }
}

/// Image generation always comes with accompanying text; an empty request
/// means text.
fn normalize_modalities(requested: &[Modality]) -> Vec<Modality> {
    let mut modalities: Vec<Modality> = requested.to_vec();
    if modalities.is_empty() || modalities.contains(&Modality::Image) {
        modalities.push(Modality::Text);
    }
    modalities.sort();
    modalities.dedup();
    modalities
}

/// Fully resolved configuration for one model call.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationConfig {
    pub model: String,
    pub modalities: Vec<Modality>,
    pub safety: SafetyPolicy,
}

impl InvocationConfig {
    /// Model id without the `provider/` prefix.
    pub fn model_id(&self) -> &str {
        self.model
            .split_once('/')
            .map(|(_, id)| id)
            .unwrap_or(&self.model)
    }

    pub fn wants(&self, modality: Modality) -> bool {
        self.modalities.contains(&modality)
    }

    /// Text-only variant of this configuration.
    pub fn text_only(&self) -> Self {
        Self {
            modalities: vec![Modality::Text],
            ..self.clone()
        }
    }
}
