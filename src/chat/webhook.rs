use log::debug;
use reqwest::Client;
use serde_json::json;

use super::{ChatError, Embed};
use crate::http::error_body;

/// Username monitoring alerts are posted under
pub const MONITORING_USERNAME: &str = "Price Bot Monitoring";

/// An incoming webhook used for operator alerts
pub struct MonitoringWebhook {
    client: Client,
    url: String,
}

impl MonitoringWebhook {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub async fn post_embed(&self, embed: &Embed) -> Result<(), ChatError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "username": MONITORING_USERNAME, "embeds": [embed] }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Api {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }
        debug!("Posted monitoring alert {:?}", embed.title);
        Ok(())
    }
}
