//! # shiksha-flows
//!
//! Typed generative flows for the Shiksha AI teaching assistant.
//!
//! Every feature of the assistant (worksheets, simplified answers, quizzes,
//! visual aids, reading-fluency scoring, free-form content) is a [`Flow`]: a
//! named operation that validates its input against a schema, renders a
//! multi-modal prompt, calls a generative model with schema guidance, and
//! validates what comes back before handing the caller a typed result.
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`schema`] | Declarative field schemas, validation and coercion |
//! | [`media`] | `data:` URI blobs for image and audio input |
//! | [`prompt`] | Prompt template compilation and rendering |
//! | [`model`] | The [`ModelClient`] seam and the Gemini client |
//! | [`flow`] | Flow definition and the invocation pipeline |
//! | [`registry`] | Name-indexed, read-only set of flows |
//! | [`education`] | The assistant's six concrete flows |
//! | [`game`] | Parsing of generated quiz documents at the caller boundary |
//! | [`config`] | Process-wide settings from YAML and environment |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shiksha_flows::education::{self, questions::AnswerStudentQuestionInput};
//! use shiksha_flows::{GeminiClient, Settings};
//!
//! #[tokio::main]
//! async fn main() -> shiksha_flows::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let client = Arc::new(GeminiClient::from_settings(&settings)?);
//!     let registry = education::registry(client, &settings.model_defaults())?;
//!
//!     let answer = education::questions::typed(&registry)?
//!         .invoke(&AnswerStudentQuestionInput {
//!             question: "Why is the sky blue?".into(),
//!         })
//!         .await?;
//!     println!("{}\n\n{}", answer.simplified_explanation, answer.analogy);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod education;
pub mod error;
pub mod flow;
pub mod game;
pub mod media;
pub mod model;
pub mod prompt;
pub mod registry;
pub mod schema;

pub use config::Settings;
pub use error::{Error, ErrorContext, ErrorKind, FailureOrigin};
pub use flow::{Flow, FlowBuilder, FlowStage, InvokeOptions, OutputMode, TypedFlow};
pub use media::{DataUri, MediaKind, Modality};
pub use model::{
    GeminiClient, GeminiClientBuilder, HarmBlockThreshold, HarmCategory, InvocationConfig,
    ModelClient, ModelConfig, ModelDefaults, ModelRequest, ModelResponse, SafetyPolicy,
    ServiceErrorClass, UsageInfo,
};
pub use prompt::{PromptPart, PromptTemplate, RenderedPrompt};
pub use registry::{FlowRegistry, FlowRegistryBuilder};
pub use schema::{ExcessFields, Field, FieldType, ObjectSchema, ValidationError};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
