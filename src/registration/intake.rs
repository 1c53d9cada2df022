//! Turning `!register` chat messages into queued registration requests.

use std::sync::Arc;

use log::{error, info, warn};

use super::types::RegistrationRequest;
use crate::chat::{ChatClient, Embed, IncomingMessage};
use crate::platform::{RegistrationQueue, RegistrationTable, TableError};

pub const ALREADY_REGISTERED_MESSAGE: &str = "You have already registered for SourceCred. \
You should be included in the current cred scores. If you believe you are not, reach out to an \
admin. Thanks!";

pub const ENQUEUE_FAILED_MESSAGE: &str = "There was an issue submitting your SourceCred \
registration. Please reach out to an admin or try again later.";

pub const RECEIVED_TITLE: &str = "**Sourcecred registration received**";

/// Bot commands the relay recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Register,
    Kudos,
}

impl Command {
    pub const REGISTER_TRIGGER: &'static str = "!register";
    pub const KUDOS_TRIGGER: &'static str = "!kudos";

    /// The command a message starts with, if any
    pub fn detect(content: &str) -> Option<Self> {
        let content = content.trim();
        if content.starts_with(Self::REGISTER_TRIGGER) {
            Some(Command::Register)
        } else if content.starts_with(Self::KUDOS_TRIGGER) {
            Some(Command::Kudos)
        } else {
            None
        }
    }
}

/// Optional fields pulled from a submission's body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub github: Option<String>,
    pub discourse: Option<String>,
    pub wallet_address: Option<String>,
}

/// Read `github:`, `discourse:` and `address:` lines out of a message.
///
/// Prefixes are case-sensitive and must start the line (after indentation).
/// A later line overrides an earlier one; an empty value clears the field.
pub fn parse_submission(content: &str) -> Submission {
    let mut submission = Submission::default();
    for line in content.lines() {
        let line = line.trim_start();
        let (slot, rest) = if let Some(rest) = line.strip_prefix("github:") {
            (&mut submission.github, rest)
        } else if let Some(rest) = line.strip_prefix("discourse:") {
            (&mut submission.discourse, rest)
        } else if let Some(rest) = line.strip_prefix("address:") {
            (&mut submission.wallet_address, rest)
        } else {
            continue;
        };
        let value = rest.trim();
        *slot = (!value.is_empty()).then(|| value.to_string());
    }
    submission
}

/// Build the queue payload for a message
pub fn build_request(message: &IncomingMessage) -> RegistrationRequest {
    let submission = parse_submission(&message.content);
    RegistrationRequest {
        identity: message.author_id.clone(),
        display_name: message.author_name.clone(),
        github: submission.github,
        discourse: submission.discourse,
        wallet_address: submission.wallet_address,
    }
}

/// The embed echoed back into the channel
pub fn received_embed(request: &RegistrationRequest) -> Embed {
    let mut embed = Embed::titled(RECEIVED_TITLE).description(format!(
        "Received registration request for user {}. Registering user with the following fields.",
        request.display_name
    ));
    let fields = [
        ("Github", &request.github),
        ("Discourse", &request.discourse),
        ("Address", &request.wallet_address),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            embed = embed.field(name, value.as_str(), false);
        }
    }
    embed
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("registration table lookup failed: {0}")]
    Table(#[from] TableError),
    #[error("failed to encode registration request: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Not a registration message, or authored by the bot
    Ignored,
    AlreadyRegistered,
    Queued { message_id: String },
    EnqueueFailed,
}

/// Intake behaviour switches
#[derive(Debug, Clone, Default)]
pub struct IntakeOptions {
    /// Messages from this author are never handled
    pub bot_user_id: Option<String>,
    pub kudos_registers: bool,
}

pub struct Intake {
    queue: Arc<dyn RegistrationQueue>,
    table: Arc<dyn RegistrationTable>,
    chat: Arc<dyn ChatClient>,
    options: IntakeOptions,
}

impl Intake {
    pub fn new(
        queue: Arc<dyn RegistrationQueue>,
        table: Arc<dyn RegistrationTable>,
        chat: Arc<dyn ChatClient>,
        options: IntakeOptions,
    ) -> Self {
        Self {
            queue,
            table,
            chat,
            options,
        }
    }

    fn should_handle(&self, message: &IncomingMessage) -> bool {
        if self.options.bot_user_id.as_deref() == Some(message.author_id.as_str()) {
            return false;
        }
        match Command::detect(&message.content) {
            Some(Command::Register) => true,
            Some(Command::Kudos) => self.options.kudos_registers,
            None => false,
        }
    }

    /// Handle one chat message.
    ///
    /// Table errors are returned. Chat failures are logged and do not change
    /// the outcome.
    pub async fn handle(&self, message: &IncomingMessage) -> Result<IntakeOutcome, IntakeError> {
        if !self.should_handle(message) {
            return Ok(IntakeOutcome::Ignored);
        }

        if self.table.contains(&message.author_id).await? {
            info!(
                "{} ({}) is already registered",
                message.author_name, message.author_id
            );
            self.notify(&message.author_id, ALREADY_REGISTERED_MESSAGE).await;
            return Ok(IntakeOutcome::AlreadyRegistered);
        }

        let request = build_request(message);
        info!("Registration fields: {:?}", request);
        let body = request.to_json()?;

        match self.queue.push(&body).await {
            Ok(message_id) => {
                info!(
                    "Queued registration {} on {}",
                    message_id,
                    self.queue.name()
                );
                if let Err(e) = self
                    .chat
                    .send_embed(&message.channel_id, &received_embed(&request))
                    .await
                {
                    warn!("Failed to post registration embed: {}", e);
                }
                Ok(IntakeOutcome::Queued { message_id })
            }
            Err(e) => {
                error!("Error submitting registration message: {}", e);
                self.notify(&message.author_id, ENQUEUE_FAILED_MESSAGE).await;
                Ok(IntakeOutcome::EnqueueFailed)
            }
        }
    }

    async fn notify(&self, user_id: &str, content: &str) {
        if let Err(e) = self.chat.send_direct_message(user_id, content).await {
            warn!("Failed to DM {}: {}", user_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "!register\n\
        github: test_user\n\
        discourse: test_user\n\
        address: 0xB1AdceddB2941033a090dD166a462fe1c2029484\n";

    #[test]
    fn test_parse_full_submission() {
        let submission = parse_submission(FULL);
        assert_eq!(submission.github.as_deref(), Some("test_user"));
        assert_eq!(submission.discourse.as_deref(), Some("test_user"));
        assert_eq!(
            submission.wallet_address.as_deref(),
            Some("0xB1AdceddB2941033a090dD166a462fe1c2029484")
        );
        // Parsing is idempotent.
        assert_eq!(parse_submission(FULL), submission);
    }

    #[test]
    fn test_parse_prefix_rules() {
        let content = "!register\n  github:  first \nGitHub: ignored\nnote github: ignored\ngithub: second\ndiscourse:   \n";
        let submission = parse_submission(content);
        assert_eq!(submission.github.as_deref(), Some("second"));
        assert_eq!(submission.discourse, None);
        assert_eq!(submission.wallet_address, None);
    }

    #[test]
    fn test_later_empty_line_clears_field() {
        let submission = parse_submission("github: octocat\ngithub:");
        assert_eq!(submission.github, None);
    }

    #[test]
    fn test_value_keeps_inner_colons() {
        let submission = parse_submission("discourse: https://forum.badger.finance/u/me");
        assert_eq!(
            submission.discourse.as_deref(),
            Some("https://forum.badger.finance/u/me")
        );
    }

    #[test]
    fn test_command_detection() {
        assert_eq!(Command::detect("  !register\ngithub: x"), Some(Command::Register));
        assert_eq!(Command::detect("!kudos @someone"), Some(Command::Kudos));
        assert_eq!(Command::detect("please !register me"), None);
        assert_eq!(Command::detect(""), None);
    }

    #[test]
    fn test_received_embed_lists_present_fields() {
        let request = RegistrationRequest {
            identity: "123456789012345678".to_string(),
            display_name: "test#0000".to_string(),
            github: Some("octocat".to_string()),
            discourse: None,
            wallet_address: Some("0xabc".to_string()),
        };
        let embed = received_embed(&request);
        assert_eq!(embed.title.as_deref(), Some(RECEIVED_TITLE));
        let names: Vec<&str> = embed.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Github", "Address"]);
        assert!(embed.description.unwrap().contains("test#0000"));
    }
}
