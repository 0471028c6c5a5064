//! Scripted text-generation double for tests

use async_trait::async_trait;
use atlas_core::{
    AtlasError, AtlasResult, GeneratedText, LlmMessage, ModelTier, TextGenerationProvider,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// One recorded call to [`MockTextProvider::generate`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub messages: Vec<LlmMessage>,
    pub tier: ModelTier,
}

/// A deterministic generation provider. Responses are popped from a script
/// queue; once the script runs out, `default_response` is returned. Every
/// call is recorded so tests can assert on prompts and tier selection.
pub struct MockTextProvider {
    script: Mutex<VecDeque<String>>,
    default_response: Mutex<String>,
    calls: Mutex<Vec<RecordedCall>>,
    fail_all: AtomicBool,
}

impl MockTextProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_response: Mutex::new("mock response".to_string()),
            calls: Mutex::new(Vec::new()),
            fail_all: AtomicBool::new(false),
        }
    }

    /// Queue a response to be returned by the next unscripted call.
    pub fn push_response(&self, text: impl Into<String>) {
        self.script.lock().unwrap().push_back(text.into());
    }

    /// Set the response returned once the script queue is empty.
    pub fn set_default_response(&self, text: impl Into<String>) {
        *self.default_response.lock().unwrap() = text.into();
    }

    /// Make every subsequent call fail with a transient error.
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockTextProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerationProvider for MockTextProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[LlmMessage],
        tier: ModelTier,
    ) -> AtlasResult<GeneratedText> {
        self.calls.lock().unwrap().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            messages: messages.to_vec(),
            tier,
        });

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(AtlasError::unavailable(
                "mock-generation",
                "scripted failure",
                1,
            ));
        }

        let text = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.lock().unwrap().clone());

        Ok(GeneratedText {
            text,
            model: "mock".to_string(),
        })
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
