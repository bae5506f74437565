use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ChatBackend, ChatError};
use crate::config::ChatConfig;

/// Client for the Generative Language `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ChatError::NotConfigured)?
            .to_string();
        let http = reqwest::Client::builder()
            .user_agent(concat!("stablebook/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint(&config.base_url, &config.model),
            api_key,
        })
    }
}

fn endpoint(base_url: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    )
}

fn request_body(system: &str, prompt: &str) -> serde_json::Value {
    json!({
        "systemInstruction": { "parts": [{ "text": system }] },
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
    })
}

fn reply_text(resp: GenerateResponse) -> Result<String, ChatError> {
    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ChatError::EmptyReply);
    }
    Ok(text)
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn reply(&self, system: &str, prompt: &str) -> Result<String, ChatError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body(system, prompt))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ChatError::Api {
                status: resp.status().as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        let body: GenerateResponse = resp.json().await?;
        let text = reply_text(body)?;
        tracing::debug!(
            target: "stablebook",
            event = "chat_reply",
            chars = text.chars().count()
        );
        Ok(text)
    }
}
