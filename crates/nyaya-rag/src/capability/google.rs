//! Google Gemini generation provider.
//!
//! Thin HTTP client over the `generateContent` endpoint. Failures are
//! classified into [`CapabilityError`] at this boundary so callers never
//! inspect response text themselves.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::Generator;
use crate::error::CapabilityError;

const ENDPOINT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    model: String,
    max_output_tokens: usize,
}

impl GeminiGenerator {
    pub fn new(
        api_key: String,
        model: String,
        max_output_tokens: usize,
    ) -> Result<Self, CapabilityError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(120))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| CapabilityError::Network(e.to_string()))?;

        tracing::info!(model = %model, "creating Gemini generation provider");

        Ok(Self {
            client,
            api_key,
            model,
            max_output_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", ENDPOINT_BASE, self.model)
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, CapabilityError> {
        let request = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": self.max_output_tokens,
            }
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CapabilityError::from_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CapabilityError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(CapabilityError::from_status(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.trim().chars().take(200).collect();
            CapabilityError::Malformed(format!("{}; body: {}", e, preview))
        })?;

        let text = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CapabilityError::EmptyResponse);
        }
        Ok(text)
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_includes_model() {
        let provider =
            GeminiGenerator::new("key".into(), "gemini-2.5-flash".into(), 2048).unwrap();
        assert_eq!(
            provider.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_response_parsing_joins_parts() {
        let body = r#"{
            "candidates": [{
                "content": { "parts": [{ "text": "Article 21 " }, { "text": "guarantees life." }] }
            }]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(body).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(text, "Article 21 guarantees life.");
    }

    #[test]
    fn test_response_parsing_tolerates_missing_fields() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
