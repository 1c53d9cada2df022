//! Ledger entries and the typed views the activator works with.
//!
//! The ledger is a line-delimited JSON document. Each line is kept verbatim so
//! that writing the ledger back reproduces every untouched entry's text byte
//! for byte; the parsed [`Action`] is only a view used for lookups. Line
//! separators are not preserved, see [`LedgerSnapshot::render_with`].
//!
//! [`LedgerSnapshot::render_with`]: super::snapshot::LedgerSnapshot::render_with

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An alias binding an external account to a ledger identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub address: String,
    #[serde(default)]
    pub description: String,
}

/// The kinds of ledger action the relay distinguishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AddAlias { identity_id: String, alias: Alias },
    ToggleActivation { identity_id: String },
    CreateIdentity { identity_id: Option<String> },
    Unknown { kind: Option<String> },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum KnownAction {
    AddAlias {
        #[serde(rename = "identityId")]
        identity_id: String,
        alias: Alias,
    },
    ToggleActivation {
        #[serde(rename = "identityId")]
        identity_id: String,
    },
    CreateIdentity {
        #[serde(default)]
        identity: Option<Value>,
    },
}

impl Action {
    /// Interpret an entry's `action` object; anything unrecognised or
    /// incomplete becomes `Unknown`.
    pub fn from_value(action: Option<&Value>) -> Self {
        let Some(action) = action else {
            return Action::Unknown { kind: None };
        };
        match KnownAction::deserialize(action) {
            Ok(KnownAction::AddAlias { identity_id, alias }) => {
                Action::AddAlias { identity_id, alias }
            }
            Ok(KnownAction::ToggleActivation { identity_id }) => {
                Action::ToggleActivation { identity_id }
            }
            Ok(KnownAction::CreateIdentity { identity }) => Action::CreateIdentity {
                identity_id: identity
                    .as_ref()
                    .and_then(|i| i.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            Err(_) => Action::Unknown {
                kind: action
                    .get("type")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
        }
    }
}

/// One line of the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    raw: String,
    action: Action,
}

impl LedgerEntry {
    /// Parse a single ledger line
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(line)?;
        Ok(Self {
            raw: line.to_string(),
            action: Action::from_value(value.get("action")),
        })
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// The line exactly as it will be written back
    pub fn as_line(&self) -> &str {
        &self.raw
    }
}

impl From<&ActivationRecord> for LedgerEntry {
    fn from(record: &ActivationRecord) -> Self {
        // A struct of strings and integers always serializes.
        let raw = serde_json::to_string(record).unwrap_or_default();
        Self {
            raw,
            action: Action::ToggleActivation {
                identity_id: record.action.identity_id.clone(),
            },
        }
    }
}

/// Errors from splitting an alias address
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("alias address has {found} fields, expected at least 6")]
    TooFewFields { found: usize },
}

/// A `"\0"`-delimited alias address split into its six fixed fields.
///
/// Example: `N\0sourcecred\0discord\0MEMBER\0user\0653638788026990593\0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasAddress {
    pub namespace: String,
    pub owner: String,
    pub platform: String,
    pub entity: String,
    pub subtype: String,
    pub id: String,
}

impl AliasAddress {
    pub const FIELDS: usize = 6;

    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let parts: Vec<&str> = address.split('\0').collect();
        if parts.len() < Self::FIELDS {
            return Err(AddressError::TooFewFields { found: parts.len() });
        }
        Ok(Self {
            namespace: parts[0].to_string(),
            owner: parts[1].to_string(),
            platform: parts[2].to_string(),
            entity: parts[3].to_string(),
            subtype: parts[4].to_string(),
            id: parts[5].to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleActivationAction {
    #[serde(rename = "identityId")]
    pub identity_id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A `TOGGLE_ACTIVATION` entry appended for a newly registered identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub action: ToggleActivationAction,
    #[serde(rename = "ledgerTimestamp")]
    pub ledger_timestamp: i64,
    pub uuid: String,
    pub version: String,
}

impl ActivationRecord {
    pub const ACTION_TYPE: &'static str = "TOGGLE_ACTIVATION";
    pub const VERSION: &'static str = "1";

    pub fn new(identity_id: &str, ledger_timestamp: i64, uuid: String) -> Self {
        Self {
            action: ToggleActivationAction {
                identity_id: identity_id.to_string(),
                kind: Self::ACTION_TYPE.to_string(),
            },
            ledger_timestamp,
            uuid,
            version: Self::VERSION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISCORD_ALIAS: &str = r#"{"action":{"alias":{"address":"N\u0000sourcecred\u0000discord\u0000MEMBER\u0000user\u0000653638788026990593\u0000","description":"discord/cookies#4969"},"identityId":"7aGWmcJLo8Ak6EGiPYLdRw","type":"ADD_ALIAS"},"ledgerTimestamp":1617000000000,"uuid":"abc","version":"1"}"#;
    const CREATE_IDENTITY: &str = r#"{"action":{"identity":{"address":"N\u0000sourcecred\u0000core\u0000IDENTITY\u0000FwDf9X8JzrvoCzMHYwYYLw\u0000","aliases":[],"id":"FwDf9X8JzrvoCzMHYwYYLw","name":"Tritium---VLK","subtype":"USER"},"type":"CREATE_IDENTITY"},"ledgerTimestamp":1617000000000,"uuid":"def","version":"1"}"#;

    #[test]
    fn test_parse_add_alias() {
        let entry = LedgerEntry::parse(DISCORD_ALIAS).unwrap();
        match entry.action() {
            Action::AddAlias { identity_id, alias } => {
                assert_eq!(identity_id, "7aGWmcJLo8Ak6EGiPYLdRw");
                assert_eq!(alias.description, "discord/cookies#4969");
                let address = AliasAddress::parse(&alias.address).unwrap();
                assert_eq!(address.platform, "discord");
                assert_eq!(address.id, "653638788026990593");
            }
            other => panic!("expected AddAlias, got {:?}", other),
        }
        assert_eq!(entry.as_line(), DISCORD_ALIAS);
    }

    #[test]
    fn test_parse_create_identity() {
        let entry = LedgerEntry::parse(CREATE_IDENTITY).unwrap();
        assert_eq!(
            entry.action(),
            &Action::CreateIdentity {
                identity_id: Some("FwDf9X8JzrvoCzMHYwYYLw".to_string())
            }
        );
    }

    #[test]
    fn test_unknown_and_missing_actions() {
        let entry = LedgerEntry::parse(r#"{"action":{"type":"MERGE_IDENTITIES"}}"#).unwrap();
        assert_eq!(
            entry.action(),
            &Action::Unknown {
                kind: Some("MERGE_IDENTITIES".to_string())
            }
        );

        let entry = LedgerEntry::parse("{}").unwrap();
        assert_eq!(entry.action(), &Action::Unknown { kind: None });

        // ADD_ALIAS without an alias object is not an alias.
        let entry =
            LedgerEntry::parse(r#"{"action":{"type":"ADD_ALIAS","identityId":"x"}}"#).unwrap();
        assert!(matches!(entry.action(), Action::Unknown { .. }));

        assert!(LedgerEntry::parse("not json").is_err());
    }

    #[test]
    fn test_alias_address_arity() {
        assert_eq!(
            AliasAddress::parse("N\0sourcecred\0discord"),
            Err(AddressError::TooFewFields { found: 3 })
        );
        assert_eq!(
            AliasAddress::parse(""),
            Err(AddressError::TooFewFields { found: 1 })
        );

        let core = AliasAddress::parse("N\0sourcecred\0core\0IDENTITY\0FwDf9X8JzrvoCzMHYwYYLw\0")
            .unwrap();
        assert_eq!(core.platform, "core");
        assert_eq!(core.id, "");
    }

    #[test]
    fn test_activation_record_shape() {
        let record = ActivationRecord::new("N7pyNa2bp8DIA0RQYNnrmw", 1617931054549, "ZueUX45XoDqhwbkCKaql8A".into());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["action"]["identityId"], "N7pyNa2bp8DIA0RQYNnrmw");
        assert_eq!(value["action"]["type"], "TOGGLE_ACTIVATION");
        assert_eq!(value["ledgerTimestamp"], 1617931054549i64);
        assert_eq!(value["version"], "1");

        let entry = LedgerEntry::from(&record);
        assert_eq!(
            entry.action(),
            &Action::ToggleActivation {
                identity_id: "N7pyNa2bp8DIA0RQYNnrmw".to_string()
            }
        );
        assert_eq!(LedgerEntry::parse(entry.as_line()).unwrap(), entry);
    }
}
