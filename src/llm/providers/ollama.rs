use crate::config::LlmConfig;
use crate::llm::{extract_json, GenerationRequest, LlmError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    /// Ollama constrains decoding to this JSON Schema.
    format: &'a serde_json::Value,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    done: Option<bool>,
    // Ignore the timing/context fields
    #[serde(flatten)]
    _extra: std::collections::HashMap<String, serde_json::Value>,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434/api/generate".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<serde_json::Value, LlmError> {
        info!("Sending '{}' request to Ollama with model: {}", request.schema_name, self.model);
        debug!("API URL: {}", self.api_url);

        let body = OllamaRequest {
            model: &self.model,
            system: &request.system,
            prompt: &request.prompt,
            format: &request.schema,
            stream: false, // Explicitly disable streaming
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            // Try to get the error message from the response body
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            error!("Ollama API responded with status code: {}{}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        // Get the raw text response first for diagnostics
        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        debug!("Raw response from Ollama: {}", response_text);

        let ollama_response = serde_json::from_str::<OllamaResponse>(&response_text).map_err(|e| {
            error!("Failed to parse Ollama response: {} - Response was: {}", e, response_text);
            LlmError::ResponseError(format!("Failed to parse Ollama response: {}", e))
        })?;

        if ollama_response.done == Some(false) {
            return Err(LlmError::ResponseError("Ollama returned an incomplete response".to_string()));
        }

        extract_json(&ollama_response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use serde_json::json;

    #[test]
    fn defaults_to_local_endpoint() {
        let mut config = AppConfig::default().llm;
        config.backend = "ollama".to_string();
        let provider = OllamaProvider::new(&config).unwrap();
        assert_eq!(provider.api_url, "http://localhost:11434/api/generate");
    }

    #[test]
    fn schema_is_sent_as_format() {
        let schema = json!({ "type": "object", "required": ["query"] });
        let body = OllamaRequest {
            model: "llama3",
            system: "s",
            prompt: "p",
            format: &schema,
            stream: false,
            options: OllamaOptions { temperature: 0.0 },
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["format"], schema);
        assert_eq!(value["stream"], json!(false));
    }

    #[test]
    fn incomplete_flag_is_optional() {
        let parsed: OllamaResponse =
            serde_json::from_str(r#"{"response": "{\"query\": \"SELECT 1\"}", "model": "llama3"}"#).unwrap();
        assert_eq!(parsed.done, None);
        assert_eq!(extract_json(&parsed.response).unwrap()["query"], json!("SELECT 1"));
    }
}
