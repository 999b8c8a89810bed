use crate::llm::{GenerationRequest, LlmError, TextGenerator};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Deterministic stand-in that replays canned responses in order and records
/// every request it receives.
pub struct FixtureGenerator {
    responses: Mutex<VecDeque<Result<serde_json::Value, LlmError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FixtureGenerator {
    pub fn new(responses: Vec<serde_json::Value>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<serde_json::Value, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self::with_results(vec![Err(LlmError::ConnectionError(message.to_string()))])
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FixtureGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<serde_json::Value, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::ResponseError("fixture exhausted".to_string())))
    }
}
