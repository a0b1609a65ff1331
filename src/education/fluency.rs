//! Reading-fluency scoring from an audio recording.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flow::{Flow, TypedFlow};
use crate::media::MediaKind;
use crate::model::{ModelClient, ModelDefaults};
use crate::registry::FlowRegistry;
use crate::schema::{FieldType, ObjectSchema};
use crate::Result;

pub const NAME: &str = "assessReadingFluencyFlow";

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

pub const PROMPT: &str = "You are an expert reading tutor, skilled at providing constructive feedback. A student has submitted the following audio recording of them reading aloud. Generate a fluency score (from 1 to 10, with 10 being perfectly fluent) and specific feedback to help them improve.

Audio: {{media url=audioDataUri}}

The fluency score must be a number between 1 and 10. Feedback should be concise and actionable.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessReadingFluencyInput {
    /// `data:audio/...;base64,...`
    pub audio_data_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessReadingFluencyOutput {
    pub fluency_score: f64,
    pub feedback: String,
}

pub fn input_schema() -> ObjectSchema {
    ObjectSchema::new("AssessReadingFluencyInput").field(
        "audioDataUri",
        FieldType::media(MediaKind::Audio),
        "The audio recording of the student reading, as a data URI that must include a MIME type and use Base64 encoding. Expected format: 'data:<mimetype>;base64,<encoded_data>'.",
    )
}

pub fn output_schema() -> ObjectSchema {
    ObjectSchema::new("AssessReadingFluencyOutput")
        .field(
            "fluencyScore",
            FieldType::number().range(MIN_SCORE, MAX_SCORE).coercible(),
            "A score from 1 to 10 for the student's reading fluency.",
        )
        .field(
            "feedback",
            FieldType::string().min_length(1),
            "Feedback on the student's reading performance.",
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
) -> Result<TypedFlow<AssessReadingFluencyInput, AssessReadingFluencyOutput>> {
    registry.typed(NAME)
}
