//! Free-form educational content from a teacher's prompt.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flow::{Flow, TypedFlow};
use crate::model::{ModelClient, ModelDefaults};
use crate::registry::FlowRegistry;
use crate::schema::{FieldType, ObjectSchema};
use crate::Result;

pub const NAME: &str = "generateEducationalContentFlow";

pub const PROMPT: &str = "You are a helpful assistant for teachers. Generate educational content based on the prompt given in the local language.

Prompt: {{{prompt}}}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateEducationalContentInput {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateEducationalContentOutput {
    pub generated_content: String,
}

pub fn input_schema() -> ObjectSchema {
    ObjectSchema::new("GenerateEducationalContentInput").field(
        "prompt",
        FieldType::string().min_length(10),
        "The prompt in the local language for generating educational content.",
    )
}

pub fn output_schema() -> ObjectSchema {
    ObjectSchema::new("GenerateEducationalContentOutput").field(
        "generatedContent",
        FieldType::string().min_length(1),
        "The generated educational content in the local language.",
    )
}

pub fn define(client: Arc<dyn ModelClient>, defaults: &ModelDefaults) -> Result<Flow> {
    Flow::builder(NAME)
        .input(input_schema())
        .output(output_schema())
        .prompt(PROMPT)
        .client(client)
        .build(defaults)
}

pub fn typed(
    registry: &FlowRegistry,
) -> Result<TypedFlow<GenerateEducationalContentInput, GenerateEducationalContentOutput>> {
    registry.typed(NAME)
}
