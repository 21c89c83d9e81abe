use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::BackendConfig;
use crate::escalation::PhoneNumbers;
use crate::services::{build_client, trim_base, HTTP_TIMEOUT};

/// REST/RPC backend holding user settings and lifetime counters.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct UserSettingsRow {
    #[serde(default)]
    mom_phone: Option<String>,
    #[serde(default)]
    your_phone: Option<String>,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: build_client(HTTP_TIMEOUT),
            base_url: trim_base(&config.url),
            anon_key: config.anon_key.clone(),
        }
    }

    /// Phone numbers from the first settings row that has any.
    pub async fn fetch_phone_numbers(&self) -> Result<PhoneNumbers> {
        let response = self
            .client
            .get(format!("{}/rest/v1/user_settings", self.base_url))
            .query(&[("select", "mom_phone,your_phone")])
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("backend settings error: {}", status));
        }

        let rows: Vec<UserSettingsRow> = response.json().await?;
        let row = rows.into_iter().find(|row| {
            row.mom_phone.as_deref().is_some_and(|p| !p.is_empty())
                || row.your_phone.as_deref().is_some_and(|p| !p.is_empty())
        });

        Ok(match row {
            Some(row) => PhoneNumbers {
                mom: row.mom_phone.filter(|p| !p.is_empty()),
                yours: row.your_phone.filter(|p| !p.is_empty()),
            },
            None => PhoneNumbers::default(),
        })
    }

    pub async fn increment_strikes(&self) -> Result<()> {
        self.rpc("increment_strikes", Value::Null).await
    }

    pub async fn increment_calls(&self) -> Result<()> {
        self.rpc("increment_calls", Value::Null).await
    }

    pub async fn update_session_status(&self, active: bool) -> Result<()> {
        self.rpc("update_session_status", json!({ "is_active_val": active })).await
    }

    async fn rpc(&self, name: &str, body: Value) -> Result<()> {
        let mut request = self
            .client
            .post(format!("{}/rest/v1/rpc/{}", self.base_url, name))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key);
        if !body.is_null() {
            request = request.json(&body);
        }

        let status = request.send().await?.status();
        if !status.is_success() {
            return Err(anyhow!("backend rpc {} failed: {}", name, status));
        }
        debug!(rpc = name, "backend rpc ok");
        Ok(())
    }
}
