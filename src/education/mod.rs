//! The Shiksha AI flows.
//!
//! | Flow | Module |
//! |------|--------|
//! | `answerStudentQuestionFlow` | [`questions`] |
//! | `generateEducationalContentFlow` | [`content`] |
//! | `generateGameFlow` | [`quiz`] |
//! | `generateVisualAidFlow` | [`visual_aid`] |
//! | `assessReadingFluencyFlow` | [`fluency`] |
//! | `generateWorksheetsFlow` | [`worksheets`] |
//!
//! Each module exposes its wire types, its schemas, `define` to build the
//! flow and `typed` to fetch a typed handle from a registry.

pub mod content;
pub mod fluency;
pub mod questions;
pub mod quiz;
pub mod visual_aid;
pub mod worksheets;

use std::sync::Arc;

use crate::model::{ModelClient, ModelDefaults};
use crate::registry::FlowRegistry;
use crate::Result;

/// Build a registry holding every education flow, all sharing `client`.
pub fn registry(client: Arc<dyn ModelClient>, defaults: &ModelDefaults) -> Result<FlowRegistry> {
    Ok(FlowRegistry::builder()
        .register(questions::define(client.clone(), defaults)?)?
        .register(content::define(client.clone(), defaults)?)?
        .register(quiz::define(client.clone(), defaults)?)?
        .register(visual_aid::define(client.clone(), defaults)?)?
        .register(fluency::define(client.clone(), defaults)?)?
        .register(worksheets::define(client, defaults)?)?
        .build())
}
