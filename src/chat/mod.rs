//! Chat platform seam.
//!
//! Outbound calls go through [`ChatClient`]. Inbound traffic arrives as
//! [`ChatEvent`]s on an `mpsc` channel fed by whichever gateway is running:
//! stdin ([`console`]) or HTTP ([`gateway`]).

pub mod console;
pub mod discord;
pub mod gateway;
pub mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use console::{spawn_console_gateway, LogChat};
pub use discord::DiscordRestClient;
pub use gateway::spawn_http_gateway;
pub use webhook::MonitoringWebhook;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("{0} is not supported by this chat client")]
    Unsupported(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// A rich message card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

impl Embed {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

/// A message posted in a channel the bot can see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub author_id: String,
    pub author_name: String,
    pub channel_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Message(IncomingMessage),
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<(), ChatError>;

    async fn send_direct_message(&self, user_id: &str, content: &str) -> Result<(), ChatError>;

    /// Show `activity` as the bot's "playing" status
    async fn update_presence(&self, activity: &str) -> Result<(), ChatError>;

    /// Ids of every guild the bot is a member of
    async fn own_guilds(&self) -> Result<Vec<String>, ChatError>;

    async fn update_nickname(&self, guild_id: &str, nickname: &str) -> Result<(), ChatError>;
}
