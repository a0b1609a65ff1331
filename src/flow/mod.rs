//! 流程模块 — 类型化生成流程的定义与调用
//!
//! Flow definition and the invocation pipeline.
//!
//! A [`Flow`] binds an input schema, an output schema, a prompt template, a
//! resolved model configuration and a [`ModelClient`]. Each invocation runs:
//!
//! 1. validate the input (strict: undeclared fields are rejected)
//! 2. render the prompt (media references are parsed and kind-checked)
//! 3. optionally draft the prompt with a text model
//! 4. call the model
//! 5. decode and validate the output (permissive: undeclared fields are dropped)
//!
//! Every failure carries the stage it came from ([`Error::stage`]). Flows
//! hold no mutable state and are shared between concurrent invocations via
//! `Arc`.

mod builder;
mod output;
mod stage;
mod typed;

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::Error;
use crate::model::{InvocationConfig, ModelClient, ModelRequest, ModelResponse};
use crate::prompt::{PromptTemplate, RenderedPrompt};
use crate::schema::{validate, ExcessFields, ObjectSchema};
use crate::Result;

pub use builder::FlowBuilder;
pub use output::{extract_json, OutputMode};
pub use stage::FlowStage;
pub use typed::TypedFlow;

/// Per-invocation options.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Cancelling this token aborts the pending model call.
    pub cancel: Option<CancellationToken>,
}

impl InvokeOptions {
    pub fn with_cancel(token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
        }
    }
}

/// A named, validated, model-backed operation.
#[derive(Debug)]
pub struct Flow {
    name: String,
    input_schema: ObjectSchema,
    output_schema: ObjectSchema,
    template: PromptTemplate,
    config: InvocationConfig,
    output_mode: OutputMode,
    draft: Option<InvocationConfig>,
    client: Arc<dyn ModelClient>,
}

impl Flow {
    pub fn builder(name: impl Into<String>) -> FlowBuilder {
        FlowBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_schema(&self) -> &ObjectSchema {
        &self.input_schema
    }

    pub fn output_schema(&self) -> &ObjectSchema {
        &self.output_schema
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn config(&self) -> &InvocationConfig {
        &self.config
    }

    pub fn output_mode(&self) -> &OutputMode {
        &self.output_mode
    }

    pub fn draft_config(&self) -> Option<&InvocationConfig> {
        self.draft.as_ref()
    }

    /// JSON descriptor of this flow for tooling.
    pub fn describe(&self) -> Value {
        let mut desc = json!({
            "name": self.name,
            "inputSchema": self.input_schema.to_json_schema(),
            "outputSchema": self.output_schema.to_json_schema(),
            "prompt": self.template.source(),
            "outputMode": self.output_mode.as_str(),
            "model": describe_config(&self.config),
        });
        if let OutputMode::Image { field } = &self.output_mode {
            desc["imageField"] = json!(field);
        }
        if let Some(draft) = &self.draft {
            desc["draft"] = describe_config(draft);
        }
        desc
    }

    pub async fn invoke(&self, input: Value) -> Result<Value> {
        self.invoke_with(input, InvokeOptions::default()).await
    }

    pub async fn invoke_with(&self, input: Value, options: InvokeOptions) -> Result<Value> {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("flow", flow = %self.name, invocation_id = %invocation_id);

        async move {
            let start = Instant::now();
            let mut stage = FlowStage::Created;
            let result = self.run(input, &options, &mut stage).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(_) => {
                    advance(&mut stage, FlowStage::Completed);
                    info!(model = %self.config.model, duration_ms, "flow completed");
                }
                Err(e) => {
                    let origin = e.stage().unwrap_or_else(|| stage.failure_origin());
                    warn!(
                        stage = %FlowStage::Failed(origin),
                        last_stage = %stage,
                        error_kind = ?e.kind(),
                        retryable = e.is_retryable(),
                        duration_ms,
                        error = %e,
                        "flow failed"
                    );
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        input: Value,
        options: &InvokeOptions,
        stage: &mut FlowStage,
    ) -> Result<Value> {
        let input = validate(&input, &self.input_schema, ExcessFields::Strict)
            .map_err(|errors| Error::Validation { errors })?;
        advance(stage, FlowStage::InputValidated);

        let rendered = self.template.render(&input)?;
        advance(stage, FlowStage::PromptRendered);

        let prompt = match &self.draft {
            Some(draft) => self.draft_prompt(&rendered, draft, options).await?,
            None => rendered,
        };

        let mut request = ModelRequest::new(&prompt, &self.config);
        if self.output_mode == OutputMode::Structured {
            request = request.with_output_schema(&self.output_schema);
        }
        let response = self.call(&request, options).await?;
        advance(stage, FlowStage::ModelInvoked);

        let output = output::decode(response, &self.output_mode, &self.output_schema)?;
        advance(stage, FlowStage::OutputValidated);
        Ok(output)
    }

    async fn draft_prompt(
        &self,
        rendered: &RenderedPrompt,
        draft: &InvocationConfig,
        options: &InvokeOptions,
    ) -> Result<RenderedPrompt> {
        let response = self.call(&ModelRequest::new(rendered, draft), options).await?;
        let text = response
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::malformed_output("drafting stage returned no text", None))?;
        debug!(model = %draft.model, chars = text.chars().count(), "prompt drafted");

        Ok(RenderedPrompt {
            bindings: rendered.bindings.clone(),
            ..RenderedPrompt::from_text(text)
        })
    }

    async fn call(
        &self,
        request: &ModelRequest<'_>,
        options: &InvokeOptions,
    ) -> Result<ModelResponse> {
        debug!(model = %request.model(), "invoking model");
        match &options.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(Error::cancelled()),
                    response = self.client.generate(request) => response,
                }
            }
            None => self.client.generate(request).await,
        }
    }
}

fn advance(stage: &mut FlowStage, next: FlowStage) {
    debug!(from = %stage, to = %next, "flow stage");
    *stage = next;
}

fn describe_config(config: &InvocationConfig) -> Value {
    let safety: Map<String, Value> = config
        .safety
        .iter()
        .map(|(category, threshold)| {
            (
                category.as_api_str().to_string(),
                json!(threshold.as_api_str()),
            )
        })
        .collect();
    json!({
        "model": config.model,
        "modalities": config.modalities.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
        "safety": safety,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Modality;
    use crate::model::{
        HarmBlockThreshold, HarmCategory, ModelConfig, ModelDefaults, SafetyPolicy,
    };
    use crate::schema::FieldType;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl ModelClient for Echo {
        async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelResponse> {
            Ok(ModelResponse::from_text(
                json!({ "generatedContent": request.prompt.text() }).to_string(),
            ))
        }
    }

    fn content_flow() -> Flow {
        Flow::builder("generateEducationalContentFlow")
            .input(ObjectSchema::new("In").field(
                "prompt",
                FieldType::string().min_length(10),
                "",
            ))
            .output(ObjectSchema::new("Out").field("generatedContent", FieldType::string(), ""))
            .prompt("Write content for: {{prompt}}")
            .model(ModelConfig::new().safety(SafetyPolicy::new().with(
                HarmCategory::HateSpeech,
                HarmBlockThreshold::BlockOnlyHigh,
            )))
            .client(Arc::new(Echo))
            .build(&ModelDefaults::new("googleai/gemini-2.0-flash"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_invoke_round_trip() {
        let flow = content_flow();
        let output = flow
            .invoke(json!({"prompt": "a story about monsoon rains"}))
            .await
            .unwrap();
        assert_eq!(
            output["generatedContent"],
            "Write content for: a story about monsoon rains"
        );
    }

    #[tokio::test]
    async fn test_invalid_input_reports_input_stage() {
        let err = content_flow()
            .invoke(json!({"prompt": "short"}))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(crate::FailureOrigin::Input));
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let token = CancellationToken::new();
        token.cancel();
        let err = content_flow()
            .invoke_with(
                json!({"prompt": "a story about monsoon rains"}),
                InvokeOptions::with_cancel(token),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ModelService { class: crate::ServiceErrorClass::Cancelled, .. }
        ));
    }

    #[tokio::test]
    async fn test_optional_fields_never_reach_render() {
        let input = ObjectSchema::new("ExplainInput")
            .field("topic", FieldType::string(), "")
            .optional_field("language", FieldType::string(), "");
        let output = ObjectSchema::new("Out").field("generatedContent", FieldType::string(), "");
        let defaults = ModelDefaults::new("googleai/gemini-2.0-flash");

        let err = Flow::builder("explainFlow")
            .input(input.clone())
            .output(output.clone())
            .prompt("Explain {{topic}} in {{language}}")
            .client(Arc::new(Echo))
            .build(&defaults)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);

        let flow = Flow::builder("explainFlow")
            .input(input)
            .output(output)
            .prompt("Explain {{topic}}")
            .client(Arc::new(Echo))
            .build(&defaults)
            .unwrap();
        let result = flow.invoke(json!({"topic": "plants"})).await.unwrap();
        assert_eq!(result["generatedContent"], "Explain plants");
    }

    #[test]
    fn test_describe() {
        let desc = content_flow().describe();
        assert_eq!(desc["name"], "generateEducationalContentFlow");
        assert_eq!(desc["inputSchema"]["properties"]["prompt"]["minLength"], 10);
        assert_eq!(desc["prompt"], "Write content for: {{prompt}}");
        assert_eq!(desc["outputMode"], "structured");
        assert_eq!(desc["model"]["modalities"], json!([Modality::Text.as_str()]));
        assert_eq!(
            desc["model"]["safety"]["HARM_CATEGORY_HATE_SPEECH"],
            "BLOCK_ONLY_HIGH"
        );
        assert!(desc.get("draft").is_none());
    }
}
