use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::classifier::verdict::parse_task_token;
use crate::classifier::{BoxFuture, ClassificationRequest, Classifier, ClassifierSource, Justifier, Verdict};
use crate::config::VisionConfig;
use crate::services::{build_client, text_at, trim_base, HTTP_TIMEOUT};

const API_VERSION: &str = "2023-06-01";
const JUSTIFICATION_MAX_TOKENS: u32 = 60;

/// Vision-capable messages API. Second link in the classifier chain and the
/// source of justification strings.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: Vec<Value>,
}

impl AnthropicClient {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            client: build_client(HTTP_TIMEOUT),
            base_url: trim_base(&config.base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// Send one user turn and return the first text block of the reply.
    pub async fn complete(&self, content: Vec<Value>, max_tokens: u32) -> Result<String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: vec![Message { role: "user", content }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("vision LLM error: {}", status));
        }

        let value: Value = response.json().await?;
        text_at(&value, "/content/0/text")
            .map(|text| text.trim().to_string())
            .ok_or_else(|| anyhow!("vision LLM response has no content[0].text"))
    }

    fn content_for(request: &ClassificationRequest) -> Vec<Value> {
        let mut content = vec![json!({
            "type": "text",
            "text": request.task_token_prompt(request.screenshot.is_some()),
        })];
        if let Some(shot) = &request.screenshot {
            content.push(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": shot.media_type,
                    "data": shot.to_base64(),
                }
            }));
        }
        content
    }
}

impl Classifier for AnthropicClient {
    fn source(&self) -> ClassifierSource {
        ClassifierSource::VisionLlm
    }

    fn accepts_screenshot(&self) -> bool {
        true
    }

    fn classify<'a>(&'a self, request: &'a ClassificationRequest) -> BoxFuture<'a, Verdict> {
        Box::pin(async move {
            match self.complete(Self::content_for(request), self.max_tokens).await {
                Ok(text) => parse_task_token(&text),
                Err(e) => {
                    warn!("vision classifier failed: {}", e);
                    Verdict::Unknown
                }
            }
        })
    }
}

impl Justifier for AnthropicClient {
    fn justify<'a>(&'a self, request: &'a ClassificationRequest, on_task: bool) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move {
            let content = vec![json!({
                "type": "text",
                "text": request.justification_prompt(on_task),
            })];
            match self.complete(content, JUSTIFICATION_MAX_TOKENS).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("justification request failed: {}", e);
                    None
                }
            }
        })
    }
}
