//! In-memory model client for flow tests.

#![allow(dead_code)]

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use shiksha_flows::{
    DataUri, Modality, ModelClient, ModelDefaults, ModelRequest, ModelResponse, SafetyPolicy,
};

pub const TEST_MODEL: &str = "googleai/gemini-2.0-flash";

/// What a flow actually sent to the model.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub text: String,
    pub media: Vec<DataUri>,
    pub structured: bool,
    pub modalities: Vec<Modality>,
    pub safety: SafetyPolicy,
}

type Script =
    dyn Fn(usize, &RecordedRequest) -> shiksha_flows::Result<ModelResponse> + Send + Sync;

/// Answers each call with a closure of (call index, request).
pub struct ScriptedClient {
    script: Box<Script>,
    calls: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl fmt::Debug for ScriptedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedClient")
            .field("calls", &self.calls())
            .finish()
    }
}

impl ScriptedClient {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(usize, &RecordedRequest) -> shiksha_flows::Result<ModelResponse>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always answer with the same JSON text.
    pub fn json(value: Value) -> Arc<Self> {
        let text = value.to_string();
        Self::new(move |_, _| Ok(ModelResponse::from_text(text.clone())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn generate(&self, request: &ModelRequest<'_>) -> shiksha_flows::Result<ModelResponse> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let recorded = RecordedRequest {
            model: request.model().to_string(),
            text: request.prompt.text(),
            media: request.prompt.media().cloned().collect(),
            structured: request.output_schema.is_some(),
            modalities: request.modalities().to_vec(),
            safety: request.config.safety.clone(),
        };
        self.requests.lock().unwrap().push(recorded.clone());
        (self.script)(index, &recorded)
    }
}

pub fn defaults() -> ModelDefaults {
    ModelDefaults::new(TEST_MODEL)
}

pub fn png_uri() -> String {
    DataUri::from_bytes("image/png", b"\x89PNG\r\n\x1a\n").to_string()
}

pub fn wav_uri() -> String {
    DataUri::from_bytes("audio/wav", b"RIFF\x24\x00\x00\x00WAVE").to_string()
}
