use crate::config::LlmConfig;
use crate::llm::{extract_json, GenerationRequest, LlmError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat completions backend using structured outputs.
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct PromptRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: usize,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
    strict: bool,
}

#[derive(Deserialize)]
struct PromptResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    refusal: Option<String>,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::ConfigError("API key is required for remote LLM provider".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl TextGenerator for RemoteLlmProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<serde_json::Value, LlmError> {
        let body = PromptRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: 2000,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: request.schema_name,
                    schema: &request.schema,
                    strict: true,
                },
            },
        };

        debug!("Sending '{}' request to {} with model {}", request.schema_name, self.api_url, self.model);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!("API responded with status code: {} - {}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "API responded with status code: {}",
                status
            )));
        }

        let prompt_response: PromptResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        let message = prompt_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))?;

        if let Some(refusal) = message.refusal {
            return Err(LlmError::ResponseError(format!("Model refused: {}", refusal)));
        }

        let content = message
            .content
            .ok_or_else(|| LlmError::ResponseError("Empty message content".to_string()))?;

        extract_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use serde_json::json;

    #[test]
    fn api_key_is_required() {
        let mut config = AppConfig::default().llm;
        config.api_key = None;
        assert!(matches!(RemoteLlmProvider::new(&config), Err(LlmError::ConfigError(_))));
    }

    #[test]
    fn request_asks_for_strict_json_schema() {
        let schema = json!({ "type": "object" });
        let body = PromptRequest {
            model: "gpt-4o",
            messages: vec![Message { role: "user", content: "oi" }],
            temperature: 0.0,
            max_tokens: 10,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat { name: "generated_query", schema: &schema, strict: true },
            },
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["response_format"]["type"], json!("json_schema"));
        assert_eq!(value["response_format"]["json_schema"]["name"], json!("generated_query"));
        assert_eq!(value["response_format"]["json_schema"]["strict"], json!(true));
    }
}
