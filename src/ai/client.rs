use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::config::GeminiConfig;

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub system_instruction: &'a str,
    pub prompt: &'a str,
    /// Tokens the model may spend thinking; 0 disables it.
    pub thinking_budget: u32,
}

/// A model that turns a prompt into free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(cfg: &GeminiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build gemini http client")?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

impl GenerateResponse {
    /// Concatenated answer text of the first candidate, thought parts excluded.
    fn into_text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        if let Some(reason) = candidate.finish_reason.as_deref() {
            if reason != "STOP" {
                warn!(finish_reason = reason, "gemini candidate did not finish cleanly");
            }
        }
        let text: String = candidate
            .content?
            .parts
            .into_iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn generate(&self, request: GenerationRequest<'_>) -> anyhow::Result<String> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": {
                "thinkingConfig": { "thinkingBudget": request.thinking_budget }
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("call gemini")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("gemini call failed with status {status}: {detail}");
        }

        let parsed: GenerateResponse = response.json().await.context("decode gemini response")?;
        let text = parsed
            .into_text()
            .context("gemini response missing text content")?;
        debug!(chars = text.len(), "gemini answered");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(&GeminiConfig {
            api_key: "test-key".into(),
            model: "gemini-test".into(),
            base_url: server.base_url(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    const REQ: GenerationRequest<'static> = GenerationRequest {
        system_instruction: "be brief",
        prompt: "AI chips",
        thinking_budget: 0,
    };

    #[tokio::test]
    async fn returns_candidate_text_without_thoughts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-test:generateContent")
                    .header("x-goog-api-key", "test-key");
                then.status(200).json_body(json!({
                    "candidates": [{
                        "content": { "parts": [
                            { "text": "thinking...", "thought": true },
                            { "text": "{\"headline\":" },
                            { "text": "\"x\"}" }
                        ]},
                        "finishReason": "STOP"
                    }]
                }));
            })
            .await;

        let text = client(&server).generate(REQ).await.expect("generate");
        assert_eq!(text, "{\"headline\":\"x\"}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upstream_error_status_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(503).body("overloaded");
            })
            .await;

        let err = client(&server).generate(REQ).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn empty_candidates_are_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({ "candidates": [] }));
            })
            .await;

        assert!(client(&server).generate(REQ).await.is_err());
    }
}
