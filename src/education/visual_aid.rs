//! Line-diagram visual aids.
//!
//! Two model calls: a text model turns the concept into a diagram prompt,
//! then the image model draws it. Both use the same safety policy.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flow::{Flow, OutputMode, TypedFlow};
use crate::media::{DataUri, MediaError, MediaKind, Modality};
use crate::model::{
    HarmBlockThreshold, HarmCategory, ModelClient, ModelConfig, ModelDefaults, SafetyPolicy,
};
use crate::registry::FlowRegistry;
use crate::schema::{FieldType, ObjectSchema};
use crate::Result;

pub const NAME: &str = "generateVisualAidFlow";

pub const IMAGE_MODEL: &str = "googleai/gemini-2.0-flash-preview-image-generation";

pub const PROMPT: &str = "You are an AI assistant that generates simple line diagrams for educational purposes.
Given the following concept description, write a prompt suitable for generating a line diagram of the concept. The line diagram should be simple and easy to understand for students.
Reply with the prompt only.

Concept Description: {{{conceptDescription}}}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVisualAidInput {
    pub concept_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVisualAidOutput {
    /// `data:image/...;base64,...`
    pub image_url: String,
}

impl GenerateVisualAidOutput {
    pub fn image(&self) -> std::result::Result<DataUri, MediaError> {
        DataUri::parse(&self.image_url)?.expect_kind(MediaKind::Image)
    }
}

pub fn safety_policy() -> SafetyPolicy {
    SafetyPolicy::new()
        .with(HarmCategory::HateSpeech, HarmBlockThreshold::BlockOnlyHigh)
        .with(HarmCategory::DangerousContent, HarmBlockThreshold::BlockNone)
        .with(HarmCategory::Harassment, HarmBlockThreshold::BlockMediumAndAbove)
        .with(HarmCategory::SexuallyExplicit, HarmBlockThreshold::BlockLowAndAbove)
}

pub fn input_schema() -> ObjectSchema {
    ObjectSchema::new("GenerateVisualAidInput").field(
        "conceptDescription",
        FieldType::string().min_length(5),
        "The concept to be visualized as a line diagram.",
    )
}

pub fn output_schema() -> ObjectSchema {
    ObjectSchema::new("GenerateVisualAidOutput").field(
        "imageUrl",
        FieldType::media(MediaKind::Image),
        "The generated line diagram as an image data URI.",
    )
}

pub fn define(client: Arc<dyn ModelClient>, defaults: &ModelDefaults) -> Result<Flow> {
    Flow::builder(NAME)
        .input(input_schema())
        .output(output_schema())
        .prompt(PROMPT)
        .draft(ModelConfig::new().safety(safety_policy()))
        .model(
            ModelConfig::new()
                .model(IMAGE_MODEL)
                .modalities([Modality::Text, Modality::Image])
                .safety(safety_policy()),
        )
        .output_mode(OutputMode::image("imageUrl"))
        .client(client)
        .build(defaults)
}

pub fn typed(
    registry: &FlowRegistry,
) -> Result<TypedFlow<GenerateVisualAidInput, GenerateVisualAidOutput>> {
    registry.typed(NAME)
}
