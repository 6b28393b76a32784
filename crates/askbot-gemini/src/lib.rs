//! Gemini adapter (text + vision).
//!
//! Implements the `askbot-core` `Assistant` port over the `generateContent` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use askbot_core::{
    config::Config,
    errors::Error,
    ports::{Assistant, AssistantRequest},
    utils::{snippet, truncate_for_transport},
    Result,
};

const IMAGE_MIME: &str = "image/jpeg";

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub reply_limit: usize,
}

impl From<&Config> for GeminiConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            api_key: cfg.gemini_api_key.clone(),
            base_url: cfg.gemini_api_base.clone(),
            model: cfg.gemini_model.clone(),
            timeout: cfg.gemini_timeout,
            reply_limit: cfg.reply_limit,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GeminiClient {
    cfg: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(cfg: GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| Error::Config(format!("gemini http client: {e}")))?;
        Ok(Self { cfg, http })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.cfg.base_url, self.cfg.model
        )
    }

    async fn generate(&self, body: &GenerateRequest<'_>) -> Result<String> {
        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.cfg.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("gemini request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "gemini request failed: {status} {}",
                snippet(&body, 200)
            )));
        }

        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("gemini json error: {e}")))?;

        extract_text(&v)
    }
}

#[async_trait]
impl Assistant for GeminiClient {
    async fn solve(&self, req: AssistantRequest) -> Result<String> {
        if req.prompt.trim().is_empty() {
            return Err(Error::Input("prompt is empty".to_string()));
        }

        let body = GenerateRequest::new(&req.prompt, req.image.as_deref());
        tracing::debug!(
            model = %self.cfg.model,
            with_image = req.image.is_some(),
            "gemini generateContent"
        );

        let text = self.generate(&body).await?;
        Ok(truncate_for_transport(&text, self.cfg.reply_limit))
    }
}

// ============== Wire Types ==============

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

impl<'a> GenerateRequest<'a> {
    /// Text part first, then the optional inlined image.
    fn new(prompt: &'a str, image: Option<&[u8]>) -> Self {
        let mut parts = vec![Part::Text { text: prompt }];
        if let Some(bytes) = image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: IMAGE_MIME,
                    data: STANDARD.encode(bytes),
                },
            });
        }
        Self {
            contents: vec![Content { parts }],
        }
    }
}

fn extract_text(v: &serde_json::Value) -> Result<String> {
    if let Some(text) = v
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(|t| t.as_str())
        .filter(|t| !t.trim().is_empty())
    {
        return Ok(text.to_string());
    }

    let reason = v
        .pointer("/promptFeedback/blockReason")
        .and_then(|r| r.as_str())
        .or_else(|| {
            v.pointer("/candidates/0/finishReason")
                .and_then(|r| r.as_str())
        });

    Err(Error::Upstream(match reason {
        Some(r) => format!("empty/unexpected response from gemini (reason: {r})"),
        None => "empty/unexpected response from gemini".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    const PATH: &str = "/v1beta/models/gemini-test:generateContent";

    fn client(base_url: String) -> GeminiClient {
        GeminiClient::new(GeminiConfig {
            api_key: "test-key".to_string(),
            base_url,
            model: "gemini-test".to_string(),
            timeout: Duration::from_secs(5),
            reply_limit: 4000,
        })
        .unwrap()
    }

    fn answer(text: &str) -> String {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
    }

    #[test]
    fn text_only_body_has_one_part() {
        let body = serde_json::to_value(GenerateRequest::new("2+2?", None)).unwrap();
        assert_eq!(body, json!({"contents": [{"parts": [{"text": "2+2?"}]}]}));
    }

    #[test]
    fn image_body_has_text_then_inline_image() {
        let image: &[u8] = b"\xff\xd8jpeg";
        let body = serde_json::to_value(GenerateRequest::new("solve", Some(image))).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], json!({"text": "solve"}));
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(
            parts[1]["inline_data"]["data"],
            STANDARD.encode(image)
        );
    }

    #[test]
    fn extract_reports_block_reason() {
        let err = extract_text(&json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        let err = extract_text(&json!({"candidates": [{"content": {}}]})).unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }

    #[tokio::test]
    async fn solve_returns_first_candidate_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_header("x-goog-api-key", "test-key")
            .match_body(mockito::Matcher::Json(
                json!({"contents": [{"parts": [{"text": "2+2?"}]}]}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(answer("4"))
            .create_async()
            .await;

        let out = client(server.url())
            .solve(AssistantRequest::text("2+2?"))
            .await
            .unwrap();

        assert_eq!(out, "4");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn solve_sends_image_as_second_part() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_body(mockito::Matcher::Json(json!({"contents": [{"parts": [
                {"text": "solve"},
                {"inline_data": {"mime_type": "image/jpeg", "data": STANDARD.encode([1u8, 2, 3])}}
            ]}]})))
            .with_status(200)
            .with_body(answer("x = 3"))
            .create_async()
            .await;

        let out = client(server.url())
            .solve(AssistantRequest::with_image("solve", vec![1, 2, 3]))
            .await
            .unwrap();

        assert_eq!(out, "x = 3");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_becomes_upstream_error_with_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let err = client(server.url())
            .solve(AssistantRequest::text("2+2?"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Upstream(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn empty_candidates_become_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(json!({"candidates": []}).to_string())
            .create_async()
            .await;

        let err = client(server.url())
            .solve(AssistantRequest::text("hi"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("empty/unexpected"));
    }

    #[tokio::test]
    async fn malformed_json_becomes_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let err = client(server.url())
            .solve(AssistantRequest::text("hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Upstream(_)));
    }

    #[tokio::test]
    async fn long_answers_are_truncated() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(answer(&"y".repeat(5000)))
            .create_async()
            .await;

        let out = client(server.url())
            .solve(AssistantRequest::text("essay"))
            .await
            .unwrap();

        assert!(out.chars().count() <= 4000);
        assert!(out.ends_with(askbot_core::utils::TRUNCATION_MARKER));
    }

    #[tokio::test]
    async fn empty_prompt_is_input_error() {
        let err = client("http://127.0.0.1:9".to_string())
            .solve(AssistantRequest::text("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }
}
