//! Decoding model responses into output values.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::model::ModelResponse;
use crate::schema::{validate, ExcessFields, ObjectSchema};
use crate::Result;

static FENCED: OnceCell<Regex> = OnceCell::new();

/// How a flow turns a model response into its output object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// The response text is a JSON object matching the output schema.
    #[default]
    Structured,
    /// The response carries an inline image; its data URI becomes `field`.
    Image { field: String },
}

impl OutputMode {
    pub fn image(field: impl Into<String>) -> Self {
        OutputMode::Image {
            field: field.into(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Structured => "structured",
            OutputMode::Image { .. } => "image",
        }
    }
}

/// Parse JSON from model text, tolerating one surrounding Markdown fence.
///
/// Accepts:
/// - Raw JSON
/// - ```json ... ``` or ``` ... ``` wrapping the whole text
///
/// JSON embedded in surrounding prose is not extracted.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
        return Some(parsed);
    }

    let fenced = FENCED
        .get_or_try_init(|| Regex::new(r"^```[A-Za-z]*\s*([\s\S]*?)\s*```$"))
        .ok()?;
    let inner = fenced.captures(trimmed)?.get(1)?.as_str();
    serde_json::from_str::<Value>(inner).ok()
}

/// Decode `response` according to `mode` and validate it permissively.
pub(crate) fn decode(
    response: ModelResponse,
    mode: &OutputMode,
    schema: &ObjectSchema,
) -> Result<Value> {
    let (candidate, raw) = match mode {
        OutputMode::Structured => {
            let text = response
                .text
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| Error::malformed_output("model returned no text", None))?;
            let value = extract_json(&text).ok_or_else(|| {
                Error::malformed_output("model output is not valid JSON", Some(text.clone()))
            })?;
            (value, text)
        }
        OutputMode::Image { field } => {
            let image = response.image().ok_or_else(|| {
                Error::malformed_output(
                    "model response contains no image",
                    response.text.clone(),
                )
            })?;
            let uri = image.to_string();
            let mut obj = Map::new();
            obj.insert(field.clone(), Value::String(uri.clone()));
            (Value::Object(obj), uri)
        }
    };

    validate(&candidate, schema, ExcessFields::Permissive).map_err(|errors| {
        Error::MalformedOutput {
            message: "model output does not match the output schema".into(),
            errors,
            raw: Some(raw),
        }
    })
}
