//! Local stand-ins for the chat platform, used for dry runs.
//!
//! The console gateway reads one JSON [`IncomingMessage`] per stdin line,
//! for example
//! `{"author_id":"653638788026990593","author_name":"cookies","channel_id":"1","content":"!register\ngithub: octocat"}`.

use async_trait::async_trait;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{ChatClient, ChatError, ChatEvent, Embed, IncomingMessage};

/// Guild id reported by [`LogChat`]
pub const CONSOLE_GUILD: &str = "console";

/// A chat client that only logs what it would have sent
pub struct LogChat {
    name: String,
}

impl LogChat {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ChatClient for LogChat {
    async fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<(), ChatError> {
        let fields: Vec<String> = embed
            .fields
            .iter()
            .map(|f| format!("{}={}", f.name, f.value))
            .collect();
        info!(
            "[{}] embed to #{}: {} {}",
            self.name,
            channel_id,
            embed.title.as_deref().unwrap_or_default(),
            fields.join(", ")
        );
        Ok(())
    }

    async fn send_direct_message(&self, user_id: &str, content: &str) -> Result<(), ChatError> {
        info!("[{}] DM to {}: {}", self.name, user_id, content);
        Ok(())
    }

    async fn update_presence(&self, activity: &str) -> Result<(), ChatError> {
        info!("[{}] playing {}", self.name, activity);
        Ok(())
    }

    async fn own_guilds(&self) -> Result<Vec<String>, ChatError> {
        Ok(vec![CONSOLE_GUILD.to_string()])
    }

    async fn update_nickname(&self, guild_id: &str, nickname: &str) -> Result<(), ChatError> {
        info!("[{}] nickname in {}: {}", self.name, guild_id, nickname);
        Ok(())
    }
}

/// Feed stdin lines into `events` until EOF, shutdown, or the receiver drops
pub fn spawn_console_gateway(
    events: mpsc::Sender<ChatEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                _ = shutdown.changed() => break,
                line = lines.next_line() => line,
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("Console gateway reached end of input");
                    break;
                }
                Err(e) => {
                    warn!("Console gateway read failed: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IncomingMessage>(&line) {
                Ok(message) => {
                    if events.send(ChatEvent::Message(message)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Ignoring console line that is not a message: {}", e),
            }
        }
    })
}
