use std::time::Duration;

use async_trait::async_trait;
use safepost_core::config::LlmConfig;
use safepost_core::GeneratedText;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One completion request. `subject` carries the target title for
/// generators that pick a canned reply instead of calling a model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub subject: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation request timed out")]
    Timeout,
    #[error("generation transport failed: {0}")]
    Transport(String),
    #[error("generation service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generation response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Issues exactly one attempt. Retrying is the caller's decision and the
    /// pipeline never makes it.
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GeneratedText, GenerationError>;
}

/// OpenAI-compatible `chat/completions` client.
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
}

impl ChatCompletionsClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| GenerationError::Transport(error.to_string()))?;
        Ok(Self { http, endpoint: endpoint.into(), api_key })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            GenerationError::Transport("llm api key is not configured".to_string())
        })?;
        Self::new(config.endpoint.clone(), api_key, Duration::from_secs(config.timeout_secs))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u32,
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    fn provider_name(&self) -> &'static str {
        "openai_compatible"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedText, GenerationError> {
        let body = ChatRequest {
            model: &request.model,
            messages: [
                ChatMessage { role: "system", content: &request.system_prompt },
                ChatMessage { role: "user", content: &request.user_prompt },
            ],
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status: status.as_u16(), body });
        }

        let payload: ChatResponse =
            response.json().await.map_err(|error| GenerationError::Decode(error.to_string()))?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Decode("response carried no choices".to_string()))?;
        let token_cost = payload.usage.map(|usage| usage.total_tokens).unwrap_or(0);
        let model = payload.model.unwrap_or_else(|| request.model.clone());

        Ok(GeneratedText::new(content, token_cost, model))
    }
}

fn map_transport_error(error: reqwest::Error) -> GenerationError {
    if error.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{ChatCompletionsClient, GenerationError, GenerationRequest, TextGenerator};

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "gml-4.6".to_string(),
            system_prompt: "You are a helpful photo restoration expert.".to_string(),
            user_prompt: "Thread: faded wedding photo".to_string(),
            temperature: 0.7,
            max_output_tokens: 250,
            subject: "faded wedding photo".to_string(),
        }
    }

    fn client(server: &MockServer, timeout: Duration) -> ChatCompletionsClient {
        let endpoint = format!("{}/v1/chat/completions", server.uri());
        match ChatCompletionsClient::new(endpoint, "zai-test-key".to_string().into(), timeout) {
            Ok(client) => client,
            Err(error) => panic!("client should build: {error}"),
        }
    }

    #[tokio::test]
    async fn sends_chat_request_and_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer zai-test-key"))
            .and(body_partial_json(json!({
                "model": "gml-4.6",
                "max_tokens": 250,
                "messages": [
                    {"role": "system", "content": "You are a helpful photo restoration expert."},
                    {"role": "user", "content": "Thread: faded wedding photo"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "gml-4.6",
                "choices": [{"message": {"role": "assistant", "content": "  Scan it at 600dpi first.  "}}],
                "usage": {"total_tokens": 87}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generated = client(&server, Duration::from_secs(5)).generate(&request()).await;

        let generated = match generated {
            Ok(generated) => generated,
            Err(error) => panic!("generation should succeed: {error}"),
        };
        assert_eq!(generated.text, "  Scan it at 600dpi first.  ");
        assert_eq!(generated.token_cost, 87);
        assert_eq!(generated.model, "gml-4.6");
    }

    #[tokio::test]
    async fn non_success_status_is_reported_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server, Duration::from_secs(5)).generate(&request()).await;

        assert_eq!(
            result,
            Err(GenerationError::Status { status: 429, body: "slow down".to_string() })
        );
    }

    #[tokio::test]
    async fn empty_choices_are_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let result = client(&server, Duration::from_secs(5)).generate(&request()).await;
        assert!(matches!(result, Err(GenerationError::Decode(_))));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let result = client(&server, Duration::from_millis(50)).generate(&request()).await;
        assert_eq!(result, Err(GenerationError::Timeout));
    }
}
