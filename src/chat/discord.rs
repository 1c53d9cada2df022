//! Discord REST adapter.

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;

use super::{ChatClient, ChatError, Embed};
use crate::http::error_body;

#[derive(Debug, Deserialize)]
struct Snowflake {
    id: String,
}

/// Discord over plain REST calls.
///
/// Presence lives on the gateway websocket, which this client does not open.
pub struct DiscordRestClient {
    client: Client,
    api_base: String,
    token: String,
}

impl DiscordRestClient {
    pub fn new(client: Client, api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ChatError> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Api {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }
        Ok(response)
    }

    async fn open_dm_channel(&self, user_id: &str) -> Result<String, ChatError> {
        let request = self
            .client
            .post(self.url("/users/@me/channels"))
            .json(&json!({ "recipient_id": user_id }));
        let channel: Snowflake = self.send(request).await?.json().await?;
        Ok(channel.id)
    }
}

#[async_trait]
impl ChatClient for DiscordRestClient {
    async fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<(), ChatError> {
        let request = self
            .client
            .post(self.url(&format!("/channels/{}/messages", channel_id)))
            .json(&json!({ "embeds": [embed] }));
        self.send(request).await?;
        Ok(())
    }

    async fn send_direct_message(&self, user_id: &str, content: &str) -> Result<(), ChatError> {
        let channel_id = self.open_dm_channel(user_id).await?;
        let request = self
            .client
            .post(self.url(&format!("/channels/{}/messages", channel_id)))
            .json(&json!({ "content": content }));
        self.send(request).await?;
        debug!("Sent DM to {}", user_id);
        Ok(())
    }

    /// Presence lives on the gateway connection; REST cannot set it.
    async fn update_presence(&self, _activity: &str) -> Result<(), ChatError> {
        Err(ChatError::Unsupported("presence over REST"))
    }

    async fn own_guilds(&self) -> Result<Vec<String>, ChatError> {
        let guilds: Vec<Snowflake> = self
            .send(self.client.get(self.url("/users/@me/guilds")))
            .await?
            .json()
            .await?;
        Ok(guilds.into_iter().map(|g| g.id).collect())
    }

    async fn update_nickname(&self, guild_id: &str, nickname: &str) -> Result<(), ChatError> {
        let request = self
            .client
            .patch(self.url(&format!("/guilds/{}/members/@me", guild_id)))
            .json(&json!({ "nick": nickname }));
        self.send(request).await?;
        Ok(())
    }
}
