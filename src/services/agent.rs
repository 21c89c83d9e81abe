use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::classifier::request::TASK_MATCHING_RULES;
use crate::classifier::verdict::parse_productivity_token;
use crate::classifier::{BoxFuture, ClassificationRequest, Classifier, ClassifierSource, Verdict};
use crate::config::AgentConfig;
use crate::services::{build_client, text_at, trim_base, HTTP_TIMEOUT};

const AGENT_NAME: &str = "Productivity Monitor";

const DECISION_LOGIC: &str = "\
1. Read the user's stated task.
2. Look at the current website URL and title.
3. Ask: does this website help the user complete their stated task?
4. If YES respond with \"PRODUCTIVE\".
5. If NO respond with \"UNPRODUCTIVE\".";

/// Conversational agent service. First link in the classifier chain.
#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
    api_key: String,
    project: Option<String>,
    agent_id: String,
}

impl AgentClient {
    pub fn new(config: &AgentConfig, agent_id: impl Into<String>) -> Self {
        Self {
            client: build_client(HTTP_TIMEOUT),
            base_url: trim_base(&config.base_url),
            api_key: config.api_key.clone(),
            project: config.project.clone().filter(|p| !p.is_empty()),
            agent_id: agent_id.into(),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn agents_url(base_url: &str, project: Option<&str>) -> String {
        match project {
            Some(project) => format!("{}/v1/projects/{}/agents", base_url, project),
            None => format!("{}/v1/agents", base_url),
        }
    }

    /// Create an agent whose memory blocks carry the task-matching rules.
    /// Returns the new agent id.
    pub async fn provision(config: &AgentConfig) -> Result<String> {
        let client = build_client(HTTP_TIMEOUT);
        let base_url = trim_base(&config.base_url);
        let project = config.project.as_deref().filter(|p| !p.is_empty());

        let body = json!({
            "model": config.model,
            "name": AGENT_NAME,
            "memory_blocks": [
                {
                    "label": "productivity_rules",
                    "description": "Core rule: the user is only on task if what they are doing matches their stated task.",
                    "limit": 2000,
                    "value": TASK_MATCHING_RULES,
                },
                {
                    "label": "decision_logic",
                    "description": "Step-by-step decision process for determining productivity.",
                    "limit": 1000,
                    "value": DECISION_LOGIC,
                }
            ]
        });

        let response = client
            .post(Self::agents_url(&base_url, project))
            .bearer_auth(&config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("agent provisioning failed: {} {}", status, text));
        }

        let value: Value = response.json().await?;
        let id = text_at(&value, "/id")
            .ok_or_else(|| anyhow!("agent provisioning response has no id"))?
            .to_string();
        info!(agent_id = %id, "provisioned classification agent");
        Ok(id)
    }

    pub async fn send_message(&self, text: &str) -> Result<String> {
        let body = json!({
            "messages": [{
                "role": "user",
                "content": [{ "type": "text", "text": text }]
            }]
        });

        let url = format!(
            "{}/{}/messages",
            Self::agents_url(&self.base_url, self.project.as_deref()),
            self.agent_id
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("agent service error: {}", status));
        }

        let value: Value = response.json().await?;
        last_message_text(&value).ok_or_else(|| anyhow!("agent response has no message text"))
    }
}

/// Text of the last assistant message, falling back to the last message of any
/// kind. `content` may be a plain string or a list of text parts.
fn last_message_text(value: &Value) -> Option<String> {
    let messages = value.get("messages")?.as_array()?;
    let message = messages
        .iter()
        .rev()
        .find(|m| m.get("message_type").and_then(Value::as_str) == Some("assistant_message"))
        .or_else(|| messages.last())?;

    match message.get("content")? {
        Value::String(text) => Some(text.clone()),
        content @ Value::Array(_) => text_at(content, "/0/text").map(str::to_string),
        _ => None,
    }
}

impl Classifier for AgentClient {
    fn source(&self) -> ClassifierSource {
        ClassifierSource::AgentService
    }

    fn classify<'a>(&'a self, request: &'a ClassificationRequest) -> BoxFuture<'a, Verdict> {
        Box::pin(async move {
            match self.send_message(&request.agent_prompt()).await {
                Ok(text) => parse_productivity_token(&text),
                Err(e) => {
                    warn!("agent classifier failed: {}", e);
                    Verdict::Unknown
                }
            }
        })
    }
}
