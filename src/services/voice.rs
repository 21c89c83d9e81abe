use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::config::VoiceConfig;
use crate::services::{build_client, text_at, trim_base, HTTP_TIMEOUT};

/// Outbound voice-call API.
#[derive(Clone)]
pub struct VoiceClient {
    client: Client,
    base_url: String,
    api_key: String,
    assistant_id: String,
    phone_number_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CallRequest<'a> {
    assistant_id: &'a str,
    phone_number_id: &'a str,
    customer: Customer<'a>,
}

#[derive(Serialize)]
struct Customer<'a> {
    number: &'a str,
}

impl VoiceClient {
    pub fn new(config: &VoiceConfig) -> Self {
        Self {
            client: build_client(HTTP_TIMEOUT),
            base_url: trim_base(&config.base_url),
            api_key: config.api_key.clone(),
            assistant_id: config.assistant_id.clone(),
            phone_number_id: config.phone_number_id.clone(),
        }
    }

    /// Ask the provider to dial `number` (already normalised).
    /// Returns the provider's call id when it sends one back.
    pub async fn place_call(&self, number: &str) -> Result<Option<String>> {
        let body = CallRequest {
            assistant_id: &self.assistant_id,
            phone_number_id: &self.phone_number_id,
            customer: Customer { number },
        };

        let response = self
            .client
            .post(format!("{}/call", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("voice call failed: {} {}", status, text));
        }

        let value: Value = response.json().await.unwrap_or(Value::Null);
        Ok(text_at(&value, "/id").map(str::to_string))
    }
}
