//! Grade-differentiated worksheets from a photo of a textbook page.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flow::{Flow, TypedFlow};
use crate::media::MediaKind;
use crate::model::{ModelClient, ModelDefaults};
use crate::registry::FlowRegistry;
use crate::schema::{FieldType, ObjectSchema};
use crate::Result;

pub const NAME: &str = "generateWorksheetsFlow";

pub const LOWEST_GRADE: u32 = 1;
pub const HIGHEST_GRADE: u32 = 5;

pub const PROMPT: &str = "You are an expert teacher specializing in creating worksheets for students.
Use the textbook image and target grade levels to generate worksheets that are appropriate for the students.

Textbook Image: {{media url=textbookImage}}
Target Grades: {{{targetGrades}}}

Generate multiple worksheets based on the content of the textbook image and the target grade levels. The worksheets should be in markdown format.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWorksheetsInput {
    /// `data:image/...;base64,...`
    pub textbook_image: String,
    pub target_grades: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWorksheetsOutput {
    /// Markdown documents.
    pub worksheets: Vec<String>,
}

pub fn input_schema() -> ObjectSchema {
    ObjectSchema::new("GenerateWorksheetsInput")
        .field(
            "textbookImage",
            FieldType::media(MediaKind::Image),
            "A photo of a textbook page, as a data URI that must include a MIME type and use Base64 encoding. Expected format: 'data:<mimetype>;base64,<encoded_data>'.",
        )
        .field(
            "targetGrades",
            FieldType::array_of(
                FieldType::integer().range(f64::from(LOWEST_GRADE), f64::from(HIGHEST_GRADE)),
            )
            .min_items(1),
            "The target grade levels for the worksheets.",
        )
}

pub fn output_schema() -> ObjectSchema {
    ObjectSchema::new("GenerateWorksheetsOutput").field(
        "worksheets",
        FieldType::array_of(FieldType::string().min_length(1)).min_items(1),
        "The generated worksheets in markdown format.",
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
) -> Result<TypedFlow<GenerateWorksheetsInput, GenerateWorksheetsOutput>> {
    registry.typed(NAME)
}
