use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use reqwest::Client;
use tracing::{info, error};

use crate::models::ArtifactPayload;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("Other: {0}")] Other(String),
}

/// External synthesis capability: `(prompt, file) -> html`.
///
/// A trait seam so the orchestrator can be tested against a fake without
/// network access.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        artifact: Option<&ArtifactPayload>,
    ) -> Result<String, SynthesisError>;
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        let base_url = std::env::var("SYNTHESIS_API_BASE")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());
        let model = std::env::var("SYNTHESIS_MODEL")
            .unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    fn build_request_body(prompt: &str, artifact: Option<&ArtifactPayload>) -> serde_json::Value {
        let mut parts = vec![json!({"text": build_synthesis_prompt(prompt, artifact.is_some())})];
        if let Some(artifact) = artifact {
            parts.push(json!({
                "inlineData": {
                    "mimeType": artifact.media_type,
                    "data": artifact.data,
                }
            }));
        }
        json!({
            "contents": [{
                "parts": parts
            }],
            "generationConfig": {
                "temperature": 0.4,
                "topP": 0.95,
                "topK": 64,
                "candidateCount": 1
            }
        })
    }

    async fn perform_api_call(
        &self,
        prompt: &str,
        artifact: Option<&ArtifactPayload>,
    ) -> Result<String, SynthesisError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        info!("Making request to: {}", url.replace(&self.api_key, "***"));

        let response = self.client
            .post(&url)
            .json(&Self::build_request_body(prompt, artifact))
            .send()
            .await
            .map_err(|e| SynthesisError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("API error response: {}", error_body);
            return Err(SynthesisError::Http(format!("status={} body={}", status, error_body)));
        }

        let response_text = response.text().await
            .map_err(|e| SynthesisError::Other(e.to_string()))?;

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| SynthesisError::Other(format!("parse error: {}: {}", e, response_text)))?;

        let html = extract_first_text(&parsed)
            .map(|text| strip_code_fence(&text).to_string())
            .filter(|html| !html.trim().is_empty())
            .ok_or_else(|| SynthesisError::Other("no document payload in response".into()))?;

        info!("Received document payload ({} chars)", html.len());
        Ok(html)
    }

    fn placeholder_document(prompt: &str, artifact: Option<&ArtifactPayload>) -> String {
        let subject = if prompt.is_empty() {
            artifact
                .map(|a| a.media_type.as_str())
                .unwrap_or("a blueprint")
                .to_string()
        } else {
            prompt.to_string()
        };
        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Demo Synthesis</title></head>
<body style="font-family: monospace; background: #09090b; color: #60a5fa; padding: 2rem;">
  <h1>DEMO MODE</h1>
  <p>Interactive rendition of: {}</p>
  <button onclick="this.textContent = 'It works.'">Press to verify</button>
</body>
</html>"#,
            subject
        )
    }
}

#[async_trait]
impl Synthesizer for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        artifact: Option<&ArtifactPayload>,
    ) -> Result<String, SynthesisError> {
        if self.api_key == "DEMO_KEY" {
            info!("Using demo mode - no real synthesis performed");
            return Ok(Self::placeholder_document(prompt, artifact));
        }

        info!("Synthesizing document with Gemini API...");
        self.perform_api_call(prompt, artifact).await
    }
}

/// Instruction wrapped around the user's prompt and/or artifact.
pub fn build_synthesis_prompt(prompt: &str, has_artifact: bool) -> String {
    let source = if has_artifact {
        "the attached sketch, diagram or blueprint"
    } else {
        "the following description"
    };
    let user_intent = if prompt.is_empty() {
        String::new()
    } else {
        format!(" Additional instructions: {prompt}.")
    };
    format!(
        "Translate {source} into a complete, functional, interactive web application.{user_intent} \
        Infer the intended layout, controls and behavior from the visual structure. \
        Respond with a single self-contained HTML document (inline CSS and JavaScript, \
        no external resources) and nothing else."
    )
}

/// Models sometimes wrap the document in a Markdown fence; unwrap it.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("html").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Other(serde_json::Value),
}

fn extract_first_text(resp: &GeminiResponse) -> Option<String> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Text { text } = p {
                return Some(text.clone());
            }
        }
    }
    None
}
