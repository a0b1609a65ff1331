//! Quiz generation. The quiz itself is an opaque JSON string; see
//! [`crate::game::classify`] for turning it into something renderable.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flow::{Flow, TypedFlow};
use crate::game::{self, GameDocument, GameFormatError};
use crate::model::{ModelClient, ModelDefaults};
use crate::registry::FlowRegistry;
use crate::schema::{FieldType, ObjectSchema};
use crate::Result;

pub const NAME: &str = "generateGameFlow";

pub const PROMPT: &str = r#"You are an expert game designer specializing in creating educational quizzes.
Use the following topic to create a fun and engaging quiz for students.
The quiz can be either multiple choice questions or a word puzzle.
Return the quiz as a JSON string in the "quiz" field. For multiple choice questions use the shape
{"type": "mcq", "title": "...", "questions": [{"question": "...", "options": ["..."], "answer": "..."}]}
where "answer" is exactly one of the "options".

Topic: {{{topic}}}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateGameInput {
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateGameOutput {
    pub quiz: String,
}

impl GenerateGameOutput {
    pub fn classify(&self) -> std::result::Result<GameDocument, GameFormatError> {
        game::classify(&self.quiz)
    }
}

pub fn input_schema() -> ObjectSchema {
    ObjectSchema::new("GenerateGameInput").field(
        "topic",
        FieldType::string().min_length(3),
        "The topic for the quiz (e.g., parts of a plant).",
    )
}

pub fn output_schema() -> ObjectSchema {
    ObjectSchema::new("GenerateGameOutput").field(
        "quiz",
        FieldType::string(),
        "The generated quiz in JSON format (MCQs or word puzzle).",
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

pub fn typed(registry: &FlowRegistry) -> Result<TypedFlow<GenerateGameInput, GenerateGameOutput>> {
    registry.typed(NAME)
}
