//! Simplified answers to student questions, with an analogy.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flow::{Flow, TypedFlow};
use crate::model::{ModelClient, ModelDefaults};
use crate::registry::FlowRegistry;
use crate::schema::{FieldType, ObjectSchema};
use crate::Result;

pub const NAME: &str = "answerStudentQuestionFlow";

pub const PROMPT: &str = "You are an expert teacher skilled at explaining complex topics in simple terms.
A student has asked the following question:

{{question}}

Provide a simplified explanation and an analogy to help the student understand the answer.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerStudentQuestionInput {
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerStudentQuestionOutput {
    pub simplified_explanation: String,
    pub analogy: String,
}

pub fn input_schema() -> ObjectSchema {
    ObjectSchema::new("AnswerStudentQuestionInput").field(
        "question",
        FieldType::string().min_length(10),
        "The student's question in the local language.",
    )
}

pub fn output_schema() -> ObjectSchema {
    ObjectSchema::new("AnswerStudentQuestionOutput")
        .field(
            "simplifiedExplanation",
            FieldType::string().min_length(1),
            "A simplified explanation of the answer to the question.",
        )
        .field(
            "analogy",
            FieldType::string().min_length(1),
            "An analogy to help understand the answer.",
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
) -> Result<TypedFlow<AnswerStudentQuestionInput, AnswerStudentQuestionOutput>> {
    registry.typed(NAME)
}
