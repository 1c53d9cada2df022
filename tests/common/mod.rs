//! Shared fakes for the registration integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use badger_bots::chat::{ChatClient, ChatError, Embed, IncomingMessage};
use badger_bots::ledger::{LedgerSnapshot, LedgerStore, LedgerStoreError, MemoryLedgerStore};
use badger_bots::platform::{RegistrationTable, TableError};
use badger_bots::registration::RegisteredUserRecord;

pub const ALICE: &str = "653638788026990593";
pub const ALICE_LEDGER_ID: &str = "N7pyNa2bp8DIA0RQYNnrmw";
pub const BOB: &str = "812345678901234567";
pub const BOB_LEDGER_ID: &str = "FwDf9X8JzrvoCzMHYwYYLw";
pub const STRANGER: &str = "999999999999999999";

pub fn alias_line(identity_id: &str, platform: &str, external_id: &str) -> String {
    format!(
        r#"{{"action":{{"alias":{{"address":"N\u0000sourcecred\u0000{platform}\u0000MEMBER\u0000user\u0000{external_id}\u0000","description":"{platform}/member#0001"}},"identityId":"{identity_id}","type":"ADD_ALIAS"}},"ledgerTimestamp":1617000000000,"uuid":"a{identity_id}","version":"1"}}"#
    )
}

/// A ledger holding discord aliases for Alice and Bob
pub fn ledger_document() -> String {
    [
        r#"{"action":{"identity":{"id":"N7pyNa2bp8DIA0RQYNnrmw","name":"alice","subtype":"USER"},"type":"CREATE_IDENTITY"},"ledgerTimestamp":1617000000000,"uuid":"c1","version":"1"}"#.to_string(),
        alias_line(ALICE_LEDGER_ID, "discord", ALICE),
        alias_line(BOB_LEDGER_ID, "discord", BOB),
    ]
    .join("\n")
}

pub fn message(author_id: &str, content: &str) -> IncomingMessage {
    IncomingMessage {
        author_id: author_id.to_string(),
        author_name: format!("user-{}", &author_id[..4.min(author_id.len())]),
        channel_id: "registration".to_string(),
        content: content.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Embed { channel_id: String, embed: Embed },
    Direct { user_id: String, content: String },
}

/// Chat client that records what it was asked to send
#[derive(Default)]
pub struct RecordingChat {
    sent: Mutex<Vec<Sent>>,
    pub fail_sends: bool,
}

impl RecordingChat {
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn direct_messages_to(&self, user_id: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Direct { user_id: to, content } if to == user_id => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn embeds(&self) -> Vec<Embed> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Embed { embed, .. } => Some(embed),
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) -> Result<(), ChatError> {
        if self.fail_sends {
            return Err(ChatError::Api {
                status: 500,
                body: "unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait]
impl ChatClient for RecordingChat {
    async fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<(), ChatError> {
        self.record(Sent::Embed {
            channel_id: channel_id.to_string(),
            embed: embed.clone(),
        })
    }

    async fn send_direct_message(&self, user_id: &str, content: &str) -> Result<(), ChatError> {
        self.record(Sent::Direct {
            user_id: user_id.to_string(),
            content: content.to_string(),
        })
    }

    async fn update_presence(&self, _activity: &str) -> Result<(), ChatError> {
        Ok(())
    }

    async fn own_guilds(&self) -> Result<Vec<String>, ChatError> {
        Ok(Vec::new())
    }

    async fn update_nickname(&self, _guild_id: &str, _nickname: &str) -> Result<(), ChatError> {
        Ok(())
    }
}

/// Table whose every call fails
pub struct FailingTable;

#[async_trait]
impl RegistrationTable for FailingTable {
    fn name(&self) -> &str {
        "failing"
    }

    async fn get(&self, _identity: &str) -> Result<Option<RegisteredUserRecord>, TableError> {
        Err(TableError::Unavailable("table offline".to_string()))
    }

    async fn upsert(&self, _record: &RegisteredUserRecord) -> Result<(), TableError> {
        Err(TableError::Unavailable("table offline".to_string()))
    }
}

/// Ledger store where another writer lands a change right after every load
pub struct RacingLedgerStore {
    pub inner: Arc<MemoryLedgerStore>,
    pub concurrent_line: String,
}

#[async_trait]
impl LedgerStore for RacingLedgerStore {
    fn describe(&self) -> String {
        "racing".to_string()
    }

    async fn load(&self) -> Result<LedgerSnapshot, LedgerStoreError> {
        let snapshot = self.inner.load().await?;
        let document = self.inner.document();
        self.inner
            .set_document(format!("{}\n{}", document, self.concurrent_line));
        Ok(snapshot)
    }

    async fn replace(
        &self,
        expected_version: &str,
        document: &str,
        message: &str,
    ) -> Result<String, LedgerStoreError> {
        self.inner.replace(expected_version, document, message).await
    }
}
