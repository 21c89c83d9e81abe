use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use crate::classifier::verdict::parse_task_token;
use crate::classifier::{BoxFuture, ClassificationRequest, Classifier, ClassifierSource, Verdict};
use crate::config::FallbackConfig;
use crate::services::{build_client, text_at, trim_base, HTTP_TIMEOUT};

/// Text-only generateContent API. Last link in the classifier chain.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &FallbackConfig) -> Self {
        Self {
            client: build_client(HTTP_TIMEOUT),
            base_url: trim_base(&config.base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("fallback LLM error: {}", status));
        }

        let value: Value = response.json().await?;
        text_at(&value, "/candidates/0/content/parts/0/text")
            .map(|text| text.trim().to_string())
            .ok_or_else(|| anyhow!("fallback LLM response has no candidate text"))
    }
}

impl Classifier for GeminiClient {
    fn source(&self) -> ClassifierSource {
        ClassifierSource::FallbackLlm
    }

    fn classify<'a>(&'a self, request: &'a ClassificationRequest) -> BoxFuture<'a, Verdict> {
        Box::pin(async move {
            match self.generate(&request.task_token_prompt(false)).await {
                Ok(text) => parse_task_token(&text),
                Err(e) => {
                    warn!("fallback classifier failed: {}", e);
                    Verdict::Unknown
                }
            }
        })
    }
}
