use std::time::Duration;

use kazi_core::error::AppError;
use kazi_core::traits::{ClassificationOracle, Extractor, OracleRequest};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);
const EXTRACTION_PROMPT: &str = "You extract job postings from job board listing pages. Return every posting visible on the page. Use the posting's own link for `url`, exactly as it appears in the content. Use null for fields the page does not show. Respond ONLY with valid JSON matching the requested schema. Do not include explanations.";

/// OpenAI-compatible chat-completions client.
///
/// Serves both as the classification oracle (short plain-text answers) and
/// as the listing extractor (JSON-schema constrained output). Works with any
/// OpenAI-compatible API, including:
/// - OpenAI directly (`https://api.openai.com/v1`)
/// - Gemini via compatibility layer (`https://generativelanguage.googleapis.com/v1beta/openai`)
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Result<Self, AppError> {
        Self::build(api_key, model, base_url, DEFAULT_LLM_TIMEOUT)
    }

    /// Rebuild the client with a different per-request timeout.
    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        Self::build(&self.api_key, &self.model, &self.base_url, timeout)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build(
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    fn oracle_request(&self, request: &OracleRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message::new("system", &request.system),
                Message::new("user", &request.prompt),
            ],
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            response_format: None,
        }
    }

    fn extraction_request(
        &self,
        content: &str,
        schema: &serde_json::Value,
    ) -> Result<ChatRequest, AppError> {
        Ok(ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message::new("system", EXTRACTION_PROMPT),
                Message::new(
                    "user",
                    &format!(
                        "Extract data according to this JSON schema:\n```json\n{}\n```\n\nFrom the following page content:\n\n{}",
                        serde_json::to_string_pretty(schema)?,
                        content
                    ),
                ),
            ],
            temperature: None,
            max_tokens: None,
            response_format: Some(ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: Some(JsonSchemaWrapper {
                    name: "listings".to_string(),
                    strict: true,
                    schema: schema.clone(),
                }),
            }),
        })
    }

    /// Send one chat completion and return the first choice's text.
    async fn chat(&self, request: &ChatRequest) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {}", e))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse LLM response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::LlmError {
                message: "Empty response from LLM".into(),
                status_code: 200,
            })
    }
}

/// Map a non-2xx API response to an error.
fn api_error(status_code: u16, body: &str) -> AppError {
    if status_code == 429 {
        return AppError::RateLimitExceeded;
    }

    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("HTTP {}: {}", status_code, body));

    AppError::LlmError {
        message,
        status_code,
    }
}

// ---- OpenAI API types ----

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_schema: Option<JsonSchemaWrapper>,
}

#[derive(Serialize)]
struct JsonSchemaWrapper {
    name: String,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl ClassificationOracle for OpenAiClient {
    async fn complete(&self, request: &OracleRequest) -> Result<String, AppError> {
        self.chat(&self.oracle_request(request)).await
    }
}

impl Extractor for OpenAiClient {
    async fn extract(
        &self,
        content: &str,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, AppError> {
        let request = self.extraction_request(content, schema)?;
        let content_str = self.chat(&request).await?;

        serde_json::from_str(&content_str).map_err(|e| {
            AppError::SchemaValidationError(format!(
                "LLM returned invalid JSON: {}. Raw: {}",
                e, content_str
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::with_base_url("sk-test", "gpt-4", "https://llm.example.com/v1/").unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        assert_eq!(client().base_url, "https://llm.example.com/v1");
    }

    #[test]
    fn oracle_request_carries_decoding_bounds() {
        let req = client().oracle_request(&OracleRequest {
            system: "sys".into(),
            prompt: "classify this".into(),
            temperature: 0.1,
            max_tokens: 10,
        });
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["max_tokens"], 10);
        assert!((json["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "classify this");
        assert!(json.get("response_format").is_none());
    }

    #[test]
    fn extraction_request_uses_strict_schema() {
        let schema = serde_json::json!({"type": "object"});
        let req = client().extraction_request("page", &schema).unwrap();
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["response_format"]["type"], "json_schema");
        assert_eq!(json["response_format"]["json_schema"]["strict"], true);
        assert_eq!(json["response_format"]["json_schema"]["schema"], schema);
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn api_error_prefers_structured_message() {
        let err = api_error(401, r#"{"error": {"message": "Invalid API key"}}"#);
        assert!(matches!(
            err,
            AppError::LlmError { ref message, status_code: 401 } if message == "Invalid API key"
        ));
    }

    #[test]
    fn api_error_falls_back_to_raw_body() {
        let err = api_error(502, "Bad Gateway");
        assert!(matches!(
            err,
            AppError::LlmError { ref message, status_code: 502 }
                if message == "HTTP 502: Bad Gateway"
        ));
        assert!(err.is_transport());
    }

    #[test]
    fn rate_limit_is_distinguished() {
        assert!(matches!(api_error(429, ""), AppError::RateLimitExceeded));
    }

    #[test]
    fn timeout_change_keeps_connection_settings() {
        let c = client().with_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(c.timeout_secs, 5);
        assert_eq!(c.base_url, "https://llm.example.com/v1");
        assert_eq!(c.model(), "gpt-4");
    }

    #[test]
    fn default_timeout_applies_without_override() {
        assert_eq!(client().timeout_secs, DEFAULT_LLM_TIMEOUT.as_secs());
    }
}
