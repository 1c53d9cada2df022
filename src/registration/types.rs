//! Registration records as they travel through the queue and land in the table.

use serde::{Deserialize, Serialize};

/// A self-registration submission, serialized as the queue message body.
///
/// Field names on the wire match what the registration table and older
/// producers already use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    #[serde(rename = "discord_id", default)]
    pub identity: String,
    #[serde(rename = "discord_name", default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discourse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
}

impl RegistrationRequest {
    /// Decode a queue message body
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Encode as a queue message body
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The row written once this identity has been activated
    pub fn to_user_record(&self) -> RegisteredUserRecord {
        RegisteredUserRecord {
            identity: self.identity.clone(),
            github_username: self.github.clone(),
            discourse_username: self.discourse.clone(),
            wallet_address: self.wallet_address.clone(),
            display_name: Some(self.display_name.clone()).filter(|n| !n.is_empty()),
        }
    }
}

/// A row in the registration table; its presence means "already registered".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUserRecord {
    #[serde(rename = "discord_id")]
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discourse_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(
        rename = "discord_username",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let body = r#"{
            "discord_id": "123456789012345678",
            "discord_name": "test#0000",
            "wallet_address": "0xB1AdceddB2941033a090dD166a462fe1c2029484",
            "discourse": "test_user",
            "github": "test_user"
        }"#;
        let request = RegistrationRequest::from_json(body).unwrap();
        assert_eq!(request.identity, "123456789012345678");
        assert_eq!(request.display_name, "test#0000");
        assert_eq!(request.github.as_deref(), Some("test_user"));

        let record = request.to_user_record();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["discord_id"], "123456789012345678");
        assert_eq!(value["discord_username"], "test#0000");
        assert_eq!(value["discourse_username"], "test_user");
        assert_eq!(value["github_username"], "test_user");
        assert_eq!(
            value["wallet_address"],
            "0xB1AdceddB2941033a090dD166a462fe1c2029484"
        );
    }

    #[test]
    fn test_missing_identity_decodes_empty() {
        let request = RegistrationRequest::from_json(r#"{"github": "someone"}"#).unwrap();
        assert!(request.identity.is_empty());
        assert!(RegistrationRequest::from_json("test message").is_err());
    }
}
