use std::sync::Arc;

use crate::error::{Error, ErrorContext};
use crate::media::MediaKind;
use crate::model::{ModelClient, ModelConfig, ModelDefaults};
use crate::prompt::PromptTemplate;
use crate::schema::{FieldType, ObjectSchema};
use crate::Result;

use super::{Flow, OutputMode};

/// Builder for [`Flow`].
///
/// Everything is checked in [`FlowBuilder::build`]: template references
/// against the input schema, the image output field against the output
/// schema, and the model configuration against the process defaults.
#[derive(Debug)]
pub struct FlowBuilder {
    name: String,
    input: Option<ObjectSchema>,
    output: Option<ObjectSchema>,
    prompt: Option<String>,
    model: ModelConfig,
    output_mode: OutputMode,
    draft: Option<ModelConfig>,
    client: Option<Arc<dyn ModelClient>>,
}

impl FlowBuilder {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: None,
            output: None,
            prompt: None,
            model: ModelConfig::default(),
            output_mode: OutputMode::Structured,
            draft: None,
            client: None,
        }
    }

    pub fn input(mut self, schema: ObjectSchema) -> Self {
        self.input = Some(schema);
        self
    }

    pub fn output(mut self, schema: ObjectSchema) -> Self {
        self.output = Some(schema);
        self
    }

    pub fn prompt(mut self, template: impl Into<String>) -> Self {
        self.prompt = Some(template.into());
        self
    }

    pub fn model(mut self, config: ModelConfig) -> Self {
        self.model = config;
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    /// Send the rendered prompt to a text model first and use its answer as
    /// the prompt of the main call.
    pub fn draft(mut self, config: ModelConfig) -> Self {
        self.draft = Some(config);
        self
    }

    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self, defaults: &ModelDefaults) -> Result<Flow> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::configuration("Flow name must not be empty"));
        }
        let input_schema = self.input.ok_or_else(|| missing(&name, "input"))?;
        let output_schema = self.output.ok_or_else(|| missing(&name, "output"))?;
        let source = self.prompt.ok_or_else(|| missing(&name, "prompt"))?;
        let client = self.client.ok_or_else(|| missing(&name, "client"))?;

        let template =
            PromptTemplate::compile(source, &input_schema).map_err(|e| in_flow(&name, e))?;

        if let OutputMode::Image { field } = &self.output_mode {
            match output_schema.get(field).map(|f| &f.ty) {
                Some(FieldType::Media {
                    kind: MediaKind::Image,
                })
                | Some(FieldType::String { .. }) => {}
                _ => {
                    return Err(Error::configuration_with_context(
                        format!(
                            "Image output field '{}' must be a declared image or string field",
                            field
                        ),
                        ErrorContext::new()
                            .with_field_path(format!("{}.{}", output_schema.name(), field))
                            .with_source(name),
                    ))
                }
            }
        }

        let config = self.model.resolve(defaults).map_err(|e| in_flow(&name, e))?;
        let draft = self
            .draft
            .map(|d| d.resolve(defaults).map(|c| c.text_only()))
            .transpose()
            .map_err(|e| in_flow(&name, e))?;

        Ok(Flow {
            name,
            input_schema,
            output_schema,
            template,
            config,
            output_mode: self.output_mode,
            draft,
            client,
        })
    }
}

fn missing(flow: &str, part: &str) -> Error {
    Error::configuration_with_context(
        format!("Flow is missing its {}", part),
        ErrorContext::new()
            .with_field_path(part.to_string())
            .with_source(flow.to_string()),
    )
}

/// Attach the flow name to a configuration error raised while building it.
fn in_flow(flow: &str, err: Error) -> Error {
    match err {
        Error::Configuration { message, context } if context.source.as_deref() != Some(flow) => {
            let details = match (context.details, context.source) {
                (Some(d), Some(s)) => Some(format!("{} ({})", d, s)),
                (d, s) => d.or(s),
            };
            let mut ctx = ErrorContext::new().with_source(flow.to_string());
            ctx.field_path = context.field_path;
            ctx.details = details;
            Error::configuration_with_context(message, ctx)
        }
        other => other,
    }
}
