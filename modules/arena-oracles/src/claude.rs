use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// One-shot text completion: a system prompt and a user message in, the
/// assistant's text out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Anthropic Messages API client bound to one model.
#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    max_tokens: u32,
    http: reqwest::Client,
    base_url: String,
}

impl Claude {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            http: reqwest::Client::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl ChatModel for Claude {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/messages", self.base_url);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: vec![WireMessage {
                role: "user",
                content: user,
            }],
        };

        debug!(model = %self.model, "Claude messages request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Claude API error ({}): {}", status, error_text));
        }

        let body: MessagesResponse = response.json().await?;
        if body.stop_reason.as_deref() == Some("max_tokens") {
            debug!(model = %self.model, "Claude response hit max_tokens");
        }
        let text = body.text();
        if text.trim().is_empty() {
            return Err(anyhow!("Claude returned no text content"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_skips_non_text_blocks() {
        let body: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"{\"a\":"},{"type":"thinking","thinking":"..."},{"type":"text","text":"1}"}],"stop_reason":"end_turn"}"#,
        )
        .unwrap();
        assert_eq!(body.text(), "{\"a\":1}");
    }

    #[test]
    fn request_serializes_single_user_turn() {
        let request = MessagesRequest {
            model: "m",
            max_tokens: 10,
            system: "sys",
            messages: vec![WireMessage {
                role: "user",
                content: "hi",
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["system"], "sys");
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let claude = Claude::new("k", "m").with_base_url("http://localhost:9000/v1/");
        assert_eq!(claude.base_url, "http://localhost:9000/v1");
        assert_eq!(claude.model(), "m");
    }

    #[test]
    fn token_cap_defaults_and_overrides() {
        assert_eq!(Claude::new("k", "m").max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(Claude::new("k", "m").with_max_tokens(512).max_tokens, 512);
    }
}
