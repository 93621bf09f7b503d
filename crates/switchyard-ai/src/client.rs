//! HTTP provider client.
//!
//! Two wire shapes are spoken: the Anthropic Messages API for the
//! `anthropic` provider tag, and OpenAI-compatible chat completions for every
//! other tag (OpenRouter, OpenAI, local OpenAI-compatible servers).

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use switchyard_catalog::{ErrorKind, HttpLocation, SamplingParams};
use thiserror::Error;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const OPENROUTER_REFERER: &str = "https://github.com/switchyard-llm/switchyard";
const OPENROUTER_TITLE: &str = "Switchyard";

/// Errors from the provider client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing API key - set the {0} environment variable")]
    MissingApiKey(String),
    #[error("invalid header value for provider request")]
    InvalidHeader,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::MissingApiKey(_) => ErrorKind::Auth,
            ClientError::Api { status, .. } if *status == 401 || *status == 403 => ErrorKind::Auth,
            ClientError::Http(e) if e.is_timeout() => ErrorKind::Timeout,
            ClientError::InvalidHeader => ErrorKind::Auth,
            _ => ErrorKind::Backend,
        }
    }
}

/// What a provider returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    pub text: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    /// The provider stopped because the token limit was reached.
    pub truncated: bool,
}

// ----------------------------------------------------------------------------
// Anthropic Messages API
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

// ----------------------------------------------------------------------------
// OpenAI-compatible chat completions
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repetition_penalty: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
    error: Option<EmbeddedError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct EmbeddedError {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Client for remote model providers.
#[derive(Debug, Clone, Default)]
pub struct ProviderClient {
    client: reqwest::Client,
}

impl ProviderClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Send one generation request to the provider described by `location`.
    ///
    /// The API key is read from the environment variable named by the
    /// location; a missing key fails before any network traffic.
    pub async fn complete(
        &self,
        location: &HttpLocation,
        system: Option<&str>,
        user: &str,
        params: &SamplingParams,
    ) -> Result<ProviderReply, ClientError> {
        let api_key = std::env::var(&location.key_env_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ClientError::MissingApiKey(location.key_env_var.clone()))?;

        debug!(
            provider = %location.provider,
            endpoint = %location.endpoint,
            model = %location.model,
            "calling provider"
        );

        if location.provider == "anthropic" {
            self.complete_anthropic(location, &api_key, system, user, params)
                .await
        } else {
            self.complete_chat(location, &api_key, system, user, params)
                .await
        }
    }

    async fn complete_anthropic(
        &self,
        location: &HttpLocation,
        api_key: &str,
        system: Option<&str>,
        user: &str,
        params: &SamplingParams,
    ) -> Result<ProviderReply, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|_| ClientError::InvalidHeader)?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let request = AnthropicRequest {
            model: &location.model,
            max_tokens: params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: vec![ChatMessage {
                role: "user",
                content: user,
            }],
            system,
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
        };

        let response = self
            .client
            .post(&location.endpoint)
            .headers(headers)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), response.text().await.unwrap_or_default()));
        }

        let response: AnthropicResponse = response.json().await?;

        let text = response
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        Ok(ProviderReply {
            text,
            input_tokens: response.usage.as_ref().map(|u| u.input_tokens),
            output_tokens: response.usage.as_ref().map(|u| u.output_tokens),
            truncated: response.stop_reason.as_deref() == Some("max_tokens"),
        })
    }

    async fn complete_chat(
        &self,
        location: &HttpLocation,
        api_key: &str,
        system: Option<&str>,
        user: &str,
        params: &SamplingParams,
    ) -> Result<ProviderReply, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| ClientError::InvalidHeader)?,
        );

        let openrouter = location.provider == "openrouter";
        if openrouter {
            headers.insert("HTTP-Referer", HeaderValue::from_static(OPENROUTER_REFERER));
            headers.insert("X-Title", HeaderValue::from_static(OPENROUTER_TITLE));
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });

        // Only OpenRouter accepts the extended sampling knobs.
        let request = ChatCompletionRequest {
            model: &location.model,
            messages,
            stream: false,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            top_k: params.top_k.filter(|_| openrouter),
            min_p: params.min_p.filter(|_| openrouter),
            repetition_penalty: params.repetition_penalty.filter(|_| openrouter),
        };

        let response = self
            .client
            .post(&location.endpoint)
            .headers(headers)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), response.text().await.unwrap_or_default()));
        }

        let completion: ChatCompletionResponse = response.json().await?;

        if let Some(error) = completion.error {
            let status = error
                .code
                .as_ref()
                .and_then(|c| c.as_u64())
                .map(|c| c as u16)
                .unwrap_or(status.as_u16());
            return Err(ClientError::Api {
                status,
                message: error.message,
            });
        }

        let choice = completion.choices.into_iter().next().ok_or_else(|| ClientError::Api {
            status: status.as_u16(),
            message: "no completion returned".to_string(),
        })?;

        Ok(ProviderReply {
            text: choice.message.content.unwrap_or_default(),
            input_tokens: completion.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: completion.usage.as_ref().map(|u| u.completion_tokens),
            truncated: choice.finish_reason.as_deref() == Some("length"),
        })
    }
}

/// Build an API error, pulling `error.message` out of a JSON body if present.
fn api_error(status: u16, body: String) -> ClientError {
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or(body);
    ClientError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn location(server: &MockServer, provider: &str, key_var: &str) -> HttpLocation {
        let endpoint = if provider == "anthropic" {
            format!("{}/v1/messages", server.uri())
        } else {
            format!("{}/api/v1/chat/completions", server.uri())
        };
        HttpLocation {
            endpoint,
            provider: provider.to_string(),
            key_env_var: key_var.to_string(),
            model: "vendor/model".to_string(),
        }
    }

    #[tokio::test]
    async fn test_openrouter_chat_completion() {
        std::env::set_var("SWITCHYARD_TEST_KEY_OR", "sk-or");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-or"))
            .and(header("x-title", "Switchyard"))
            .and(body_partial_json(serde_json::json!({
                "model": "vendor/model",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ],
                "top_k": 20
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "hello"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 9, "completion_tokens": 2}
            })))
            .mount(&server)
            .await;

        let params = SamplingParams {
            top_k: Some(20),
            ..SamplingParams::default()
        };
        let reply = ProviderClient::new()
            .complete(
                &location(&server, "openrouter", "SWITCHYARD_TEST_KEY_OR"),
                Some("be brief"),
                "hi",
                &params,
            )
            .await
            .unwrap();

        assert_eq!(reply.text, "hello");
        assert_eq!(reply.input_tokens, Some(9));
        assert_eq!(reply.output_tokens, Some(2));
        assert!(!reply.truncated);
    }

    #[tokio::test]
    async fn test_anthropic_messages_shape() {
        std::env::set_var("SWITCHYARD_TEST_KEY_ANT", "sk-ant");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(serde_json::json!({"system": "sys", "max_tokens": 4096})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "part one "}, {"type": "text", "text": "part two"}],
                "stop_reason": "max_tokens",
                "usage": {"input_tokens": 5, "output_tokens": 4096}
            })))
            .mount(&server)
            .await;

        let reply = ProviderClient::new()
            .complete(
                &location(&server, "anthropic", "SWITCHYARD_TEST_KEY_ANT"),
                Some("sys"),
                "go",
                &SamplingParams::default(),
            )
            .await
            .unwrap();

        assert_eq!(reply.text, "part one part two");
        assert!(reply.truncated);
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth() {
        std::env::set_var("SWITCHYARD_TEST_KEY_401", "bad");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "invalid key", "code": 401}
            })))
            .mount(&server)
            .await;

        let err = ProviderClient::new()
            .complete(
                &location(&server, "openai", "SWITCHYARD_TEST_KEY_401"),
                None,
                "hi",
                &SamplingParams::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(err.to_string().contains("invalid key"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let server = MockServer::start().await;
        let err = ProviderClient::new()
            .complete(
                &location(&server, "openrouter", "SWITCHYARD_TEST_KEY_NEVER_SET"),
                None,
                "hi",
                &SamplingParams::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::MissingApiKey(ref v) if v == "SWITCHYARD_TEST_KEY_NEVER_SET"));
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_backend() {
        std::env::set_var("SWITCHYARD_TEST_KEY_500", "k");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = ProviderClient::new()
            .complete(
                &location(&server, "openai", "SWITCHYARD_TEST_KEY_500"),
                None,
                "hi",
                &SamplingParams::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(matches!(err, ClientError::Api { status: 503, ref message } if message == "overloaded"));
    }
}
