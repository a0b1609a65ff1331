use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Error, ErrorContext};
use crate::media::{DataUri, MediaKind};
use crate::schema::{Field, FieldType, ObjectSchema};
use crate::Result;

static PLACEHOLDER: OnceCell<Regex> = OnceCell::new();
static IDENTIFIER: OnceCell<Regex> = OnceCell::new();

fn placeholder_pattern() -> Result<&'static Regex> {
    PLACEHOLDER
        .get_or_try_init(|| Regex::new(r"\{\{(\{?)\s*([^{}]*?)\s*(\}?)\}\}"))
        .map_err(|e| Error::configuration(format!("invalid placeholder pattern: {}", e)))
}

fn identifier_pattern() -> Result<&'static Regex> {
    IDENTIFIER
        .get_or_try_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$"))
        .map_err(|e| Error::configuration(format!("invalid identifier pattern: {}", e)))
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Value { field: String },
    Media { field: String, kind: MediaKind },
}

/// A compiled prompt template.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

/// One part of a rendered prompt, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPart {
    Text(String),
    Media(DataUri),
}

/// The exact payload handed to a model client.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderedPrompt {
    pub parts: Vec<PromptPart>,
    /// Input values the template actually referenced, keyed by field name.
    pub bindings: Map<String, Value>,
}

impl RenderedPrompt {
    /// A prompt made of a single text part.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![PromptPart::Text(text.into())],
            bindings: Map::new(),
        }
    }

    /// Concatenation of every text part.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                PromptPart::Text(t) => Some(t.as_str()),
                PromptPart::Media(_) => None,
            })
            .collect()
    }

    pub fn media(&self) -> impl Iterator<Item = &DataUri> {
        self.parts.iter().filter_map(|p| match p {
            PromptPart::Media(m) => Some(m),
            PromptPart::Text(_) => None,
        })
    }
}

impl PromptTemplate {
    /// Compile `source`, checking every reference against `schema`.
    pub fn compile(source: impl Into<String>, schema: &ObjectSchema) -> Result<Self> {
        let source = source.into();
        let placeholder = placeholder_pattern()?;
        let identifier = identifier_pattern()?;

        let mut segments = Vec::new();
        let mut last = 0;
        for caps in placeholder.captures_iter(&source) {
            let (Some(whole), Some(expr)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let triple_open = caps.get(1).map_or(false, |m| !m.as_str().is_empty());
            let triple_close = caps.get(3).map_or(false, |m| !m.as_str().is_empty());
            if triple_open != triple_close {
                return Err(template_error("unbalanced braces", whole.as_str()));
            }

            push_text(&mut segments, &source[last..whole.start()])?;
            last = whole.end();

            let expr = expr.as_str();
            let segment = match expr.strip_prefix("media ") {
                Some(args) if !triple_open => {
                    let field = args
                        .trim()
                        .strip_prefix("url=")
                        .map(str::trim)
                        .filter(|f| identifier.is_match(f))
                        .ok_or_else(|| {
                            template_error("expected 'media url=<field>'", whole.as_str())
                        })?;
                    let kind = match &referenced_field(field, schema)?.ty {
                        FieldType::Media { kind } => *kind,
                        other => {
                            return Err(template_error(
                                &format!(
                                    "media reference to non-media field '{}' of type '{}'",
                                    field,
                                    other.type_name()
                                ),
                                whole.as_str(),
                            ))
                        }
                    };
                    Segment::Media {
                        field: field.to_string(),
                        kind,
                    }
                }
                _ if identifier.is_match(expr) => {
                    referenced_field(expr, schema)?;
                    Segment::Value {
                        field: expr.to_string(),
                    }
                }
                _ => {
                    return Err(template_error(
                        "unsupported template expression",
                        whole.as_str(),
                    ))
                }
            };
            segments.push(segment);
        }
        push_text(&mut segments, &source[last..])?;

        Ok(Self { source, segments })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Field names referenced by the template, in first-use order.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            let name = match segment {
                Segment::Value { field } | Segment::Media { field, .. } => field.as_str(),
                Segment::Text(_) => continue,
            };
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Substitute `input` into the template.
    ///
    /// Media references are parsed and kind-checked here; nothing is fetched
    /// or read from disk.
    pub fn render(&self, input: &Value) -> Result<RenderedPrompt> {
        let empty = Map::new();
        let fields = input.as_object().unwrap_or(&empty);

        let mut rendered = RenderedPrompt::default();
        let mut text = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => text.push_str(t),
                Segment::Value { field } => {
                    let value = lookup(fields, field)?;
                    text.push_str(&value_text(value));
                    rendered.bindings.insert(field.clone(), value.clone());
                }
                Segment::Media { field, kind } => {
                    let value = lookup(fields, field)?;
                    let uri = value
                        .as_str()
                        .ok_or_else(|| Error::InvalidMedia {
                            field: field.clone(),
                            reason: "expected a data URI string".into(),
                        })
                        .and_then(|s| {
                            DataUri::parse(s)
                                .and_then(|uri| uri.expect_kind(*kind))
                                .map_err(|e| Error::InvalidMedia {
                                    field: field.clone(),
                                    reason: e.to_string(),
                                })
                        })?;
                    if !text.is_empty() {
                        rendered.parts.push(PromptPart::Text(std::mem::take(&mut text)));
                    }
                    rendered.parts.push(PromptPart::Media(uri));
                    rendered.bindings.insert(field.clone(), value.clone());
                }
            }
        }
        if !text.is_empty() {
            rendered.parts.push(PromptPart::Text(text));
        }
        Ok(rendered)
    }
}

fn push_text(segments: &mut Vec<Segment>, text: &str) -> Result<()> {
    if text.contains("{{") {
        return Err(template_error("unterminated placeholder", text));
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
    Ok(())
}

fn lookup<'a>(fields: &'a Map<String, Value>, field: &str) -> Result<&'a Value> {
    fields.get(field).ok_or_else(|| Error::MissingField {
        field: field.to_string(),
    })
}

/// Scalars as text, arrays joined by `,`, objects as compact JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) | Value::Object(_) => value.to_string(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(","),
    }
}

fn template_error(message: &str, fragment: &str) -> Error {
    Error::configuration_with_context(
        format!("Invalid prompt template: {}", message),
        ErrorContext::new()
            .with_details(fragment.to_string())
            .with_source("prompt_template"),
    )
}

/// Templates may only reference required fields, so any input that passes
/// validation renders without `MissingField`.
fn referenced_field<'s>(field: &str, schema: &'s ObjectSchema) -> Result<&'s Field> {
    let declared = schema.get(field).ok_or_else(|| unknown_field(field, schema))?;
    if !declared.required {
        return Err(Error::configuration_with_context(
            format!("Prompt template references optional field '{}'", field),
            ErrorContext::new()
                .with_field_path(format!("{}.{}", schema.name(), field))
                .with_source("prompt_template"),
        ));
    }
    Ok(declared)
}

fn unknown_field(field: &str, schema: &ObjectSchema) -> Error {
    Error::configuration_with_context(
        format!("Prompt template references unknown field '{}'", field),
        ErrorContext::new()
            .with_field_path(format!("{}.{}", schema.name(), field))
            .with_source("prompt_template"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::{validate, ExcessFields};
    use serde_json::json;

    fn worksheet_schema() -> ObjectSchema {
        ObjectSchema::new("GenerateWorksheetsInput")
            .field("textbookImage", FieldType::media(MediaKind::Image), "")
            .field(
                "targetGrades",
                FieldType::array_of(FieldType::integer()).min_items(1),
                "",
            )
    }

    const WORKSHEET: &str =
        "Grades: {{targetGrades}}\nTextbook Page: {{media url=textbookImage}}\nDone.";

    #[test]
    fn test_render_text_and_media_parts() {
        let template = PromptTemplate::compile(WORKSHEET, &worksheet_schema()).unwrap();
        assert_eq!(template.placeholders(), vec!["targetGrades", "textbookImage"]);

        let input = json!({
            "textbookImage": "data:image/jpeg;base64,/9j/4AAQ",
            "targetGrades": [2, 3]
        });
        let rendered = template.render(&input).unwrap();
        assert_eq!(rendered.parts.len(), 3);
        assert_eq!(
            rendered.parts[0],
            PromptPart::Text("Grades: 2,3\nTextbook Page: ".into())
        );
        assert!(matches!(
            &rendered.parts[1],
            PromptPart::Media(m) if m.mime_type() == "image/jpeg"
        ));
        assert_eq!(rendered.parts[2], PromptPart::Text("\nDone.".into()));
        assert_eq!(rendered.media().count(), 1);
    }

    #[test]
    fn test_bindings_revalidate_against_schema() {
        let schema = worksheet_schema();
        let template = PromptTemplate::compile(WORKSHEET, &schema).unwrap();
        let input = json!({
            "textbookImage": "data:image/png;base64,iVBORw0KGgo=",
            "targetGrades": [1]
        });
        let rendered = template.render(&input).unwrap();
        let bindings = Value::Object(rendered.bindings);
        assert_eq!(validate(&bindings, &schema, ExcessFields::Strict).unwrap(), input);
    }

    #[test]
    fn test_triple_braces_do_not_escape() {
        let schema = ObjectSchema::new("S").field("question", FieldType::string(), "");
        let template =
            PromptTemplate::compile("A: {{question}} B: {{{ question }}}", &schema).unwrap();
        let rendered = template.render(&json!({"question": "<b>2 & 3</b>"})).unwrap();
        assert_eq!(rendered.text(), "A: <b>2 & 3</b> B: <b>2 & 3</b>");
    }

    #[test]
    fn test_object_values_render_as_compact_json() {
        let schema = ObjectSchema::new("S").field(
            "meta",
            FieldType::object(ObjectSchema::new("Meta").field("grade", FieldType::integer(), "")),
            "",
        );
        let template = PromptTemplate::compile("{{meta}}", &schema).unwrap();
        assert_eq!(
            template.render(&json!({"meta": {"grade": 4}})).unwrap().text(),
            r#"{"grade":4}"#
        );
    }

    #[test]
    fn test_compile_rejects_unknown_field() {
        let err = PromptTemplate::compile("Explain {{topic}}", &worksheet_schema()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("unknown field 'topic'"));
    }

    #[test]
    fn test_compile_rejects_optional_field() {
        let schema = ObjectSchema::new("ExplainInput")
            .field("topic", FieldType::string(), "")
            .optional_field("language", FieldType::string(), "");
        assert!(validate(&json!({"topic": "plants"}), &schema, ExcessFields::Strict).is_ok());

        let err =
            PromptTemplate::compile("Explain {{topic}} in {{language}}", &schema).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("optional field 'language'"));
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("ExplainInput.language")
        );

        let schema = schema.optional_field("photo", FieldType::media(MediaKind::Image), "");
        let err = PromptTemplate::compile("{{topic}} {{media url=photo}}", &schema).unwrap_err();
        assert!(err.to_string().contains("optional field 'photo'"));
    }

    #[test]
    fn test_compile_rejects_media_ref_to_text_field() {
        let schema = ObjectSchema::new("S").field("topic", FieldType::string(), "");
        let err = PromptTemplate::compile("{{media url=topic}}", &schema).unwrap_err();
        assert!(err.to_string().contains("non-media field 'topic'"));
    }

    #[test]
    fn test_compile_rejects_unsupported_expressions() {
        let schema = ObjectSchema::new("S").field("topic", FieldType::string(), "");
        for source in ["{{#if topic}}x{{/if}}", "{{topic}", "{{{topic}}", "{{ topic | upper }}"] {
            let err = PromptTemplate::compile(source, &schema).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{}", source);
        }
    }

    #[test]
    fn test_render_missing_field() {
        let schema = ObjectSchema::new("S").field("topic", FieldType::string(), "");
        let template = PromptTemplate::compile("Topic: {{topic}}", &schema).unwrap();
        let err = template.render(&json!({})).unwrap_err();
        assert!(matches!(err, Error::MissingField { field } if field == "topic"));
    }

    #[test]
    fn test_render_rejects_wrong_media_kind() {
        let schema =
            ObjectSchema::new("S").field("audioDataUri", FieldType::media(MediaKind::Audio), "");
        let template = PromptTemplate::compile("{{media url=audioDataUri}}", &schema).unwrap();

        for bad in [
            json!("data:image/png;base64,iVBORw0KGgo="),
            json!("data:audio/wav;base64,"),
            json!("not a uri"),
            json!(42),
        ] {
            let err = template.render(&json!({ "audioDataUri": bad })).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidMedia);
        }
    }
}
