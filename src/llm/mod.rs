pub mod models;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fmt;
use tracing::debug;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
    /// The backend answered, but the payload does not have the requested shape.
    InvalidPayload(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
            LlmError::InvalidPayload(msg) => write!(f, "LLM returned a non-conforming payload: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// One schema-constrained generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    /// Name of the output shape, used by backends that label their schemas.
    pub schema_name: &'static str,
    /// JSON Schema the returned object must satisfy.
    pub schema: serde_json::Value,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<serde_json::Value, LlmError>;
}

/// Runs `request` and deserializes the returned object into `T`.
pub async fn generate_object<T: DeserializeOwned>(
    generator: &dyn TextGenerator,
    request: &GenerationRequest,
) -> Result<T, LlmError> {
    let value = generator.generate(request).await?;
    debug!("Structured output for '{}': {}", request.schema_name, value);
    serde_json::from_value(value).map_err(|e| {
        LlmError::InvalidPayload(format!("'{}' does not match schema: {}", request.schema_name, e))
    })
}

pub struct LlmManager {
    generator: Box<dyn TextGenerator>,
    backend: String,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let generator: Box<dyn TextGenerator> = match config.backend.as_str() {
            "openai" | "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self {
            generator,
            backend: config.backend.clone(),
        })
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }
}

#[async_trait]
impl TextGenerator for LlmManager {
    async fn generate(&self, request: &GenerationRequest) -> Result<serde_json::Value, LlmError> {
        self.generator.generate(request).await
    }
}

/// Pulls a JSON object out of free-form model output, tolerating code fences
/// and leading chatter.
pub(crate) fn extract_json(content: &str) -> Result<serde_json::Value, LlmError> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let unfenced = strip_code_fences(trimmed);
    if let Ok(value) = serde_json::from_str(&unfenced) {
        return Ok(value);
    }

    // Last resort: outermost braces
    if let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&unfenced[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(LlmError::InvalidPayload(format!(
        "response is not a JSON object: {}",
        trimmed
    )))
}

/// Strip markdown code fences (```sql ... ``` or ``` ... ```)
pub(crate) fn strip_code_fences(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        // Skip optional language tag on the first line
        let rest = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest,
        };
        let rest = rest.trim_end();
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        rest.trim().to_string()
    } else {
        trimmed.to_string()
    }
}
