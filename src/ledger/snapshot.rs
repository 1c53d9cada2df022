//! A ledger document pinned to the version it was read at.

use std::collections::{HashMap, HashSet};

use log::debug;

use super::types::{Action, ActivationRecord, Alias, AliasAddress, LedgerEntry};

/// Length of a platform identity the ledger can hold an alias for
pub const IDENTITY_LEN: usize = 18;

#[derive(Debug, thiserror::Error)]
#[error("ledger line {line} is not valid JSON: {source}")]
pub struct LedgerParseError {
    pub line: usize,
    #[source]
    pub source: serde_json::Error,
}

/// Ledger entries in document order plus the version they were read at.
///
/// A snapshot is never mutated; appending produces a new document that is
/// written against [`LedgerSnapshot::version`].
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    version: String,
    entries: Vec<LedgerEntry>,
    trailing_newline: bool,
}

impl LedgerSnapshot {
    /// Parse a line-delimited JSON document. Blank lines are dropped.
    pub fn parse(version: impl Into<String>, document: &str) -> Result<Self, LedgerParseError> {
        let mut entries = Vec::new();
        for (index, line) in document.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry = LedgerEntry::parse(line).map_err(|source| LedgerParseError {
                line: index + 1,
                source,
            })?;
            entries.push(entry);
        }
        Ok(Self {
            version: version.into(),
            entries,
            trailing_newline: document.ends_with('\n'),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every `ADD_ALIAS` entry whose address belongs to `platform_tag`,
    /// in document order.
    pub fn platform_aliases<'a>(
        &'a self,
        platform_tag: &str,
    ) -> impl Iterator<Item = (&'a str, &'a Alias, AliasAddress)> + 'a {
        let platform_tag = platform_tag.to_owned();
        self.entries.iter().filter_map(move |entry| {
            let Action::AddAlias { identity_id, alias } = entry.action() else {
                return None;
            };
            match AliasAddress::parse(&alias.address) {
                Ok(address) if address.platform == platform_tag => {
                    Some((identity_id.as_str(), alias, address))
                }
                Ok(_) => None,
                Err(e) => {
                    debug!("Skipping alias for {}: {}", identity_id, e);
                    None
                }
            }
        })
    }

    /// Ledger identity id bound to a platform identity, first match wins
    pub fn find_identity(&self, identity: &str, platform_tag: &str) -> Option<&str> {
        if identity.chars().count() != IDENTITY_LEN {
            return None;
        }
        self.platform_aliases(platform_tag)
            .find(|(_, _, address)| address.id == identity)
            .map(|(identity_id, _, _)| identity_id)
    }

    /// Ledger identity ids whose activation is currently on.
    ///
    /// Each `TOGGLE_ACTIVATION` flips the state, starting from inactive.
    pub fn active_identities(&self) -> HashSet<&str> {
        let mut toggles: HashMap<&str, usize> = HashMap::new();
        for entry in &self.entries {
            if let Action::ToggleActivation { identity_id } = entry.action() {
                *toggles.entry(identity_id.as_str()).or_default() += 1;
            }
        }
        toggles
            .into_iter()
            .filter(|(_, count)| count % 2 == 1)
            .map(|(id, _)| id)
            .collect()
    }

    /// The full document with `records` appended after the existing entries.
    ///
    /// Entries are joined with `\n`: blank lines from the parsed document are
    /// gone and CRLF separators come back as LF.
    pub fn render_with(&self, records: &[ActivationRecord]) -> String {
        let appended: Vec<LedgerEntry> = records.iter().map(LedgerEntry::from).collect();
        let mut document = self
            .entries
            .iter()
            .chain(appended.iter())
            .map(LedgerEntry::as_line)
            .collect::<Vec<_>>()
            .join("\n");
        if self.trailing_newline {
            document.push('\n');
        }
        document
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn alias_line(identity_id: &str, platform: &str, external_id: &str) -> String {
        format!(
            r#"{{"action":{{"alias":{{"address":"N\u0000sourcecred\u0000{}\u0000MEMBER\u0000user\u0000{}\u0000","description":"{}/someone#0001"}},"identityId":"{}","type":"ADD_ALIAS"}},"ledgerTimestamp":1617000000000,"uuid":"u-{}","version":"1"}}"#,
            platform, external_id, platform, identity_id, identity_id
        )
    }

    pub(crate) fn toggle_line(identity_id: &str) -> String {
        format!(
            r#"{{"action":{{"identityId":"{}","type":"TOGGLE_ACTIVATION"}},"ledgerTimestamp":1617000000001,"uuid":"t-{}","version":"1"}}"#,
            identity_id, identity_id
        )
    }

    fn sample() -> LedgerSnapshot {
        let lines = [
            r#"{"action":{"identity":{"id":"FwDf9X8JzrvoCzMHYwYYLw","name":"Tritium---VLK"},"type":"CREATE_IDENTITY"}}"#.to_string(),
            alias_line("GithubOnly000000000000", "github", "653638788026990593"),
            alias_line("N7pyNa2bp8DIA0RQYNnrmw", "discord", "653638788026990593"),
            alias_line("SecondMatch00000000000", "discord", "653638788026990593"),
            r#"{"action":{"alias":{"address":"broken","description":"x"},"identityId":"Broken","type":"ADD_ALIAS"}}"#.to_string(),
        ];
        LedgerSnapshot::parse("v1", &lines.join("\n")).unwrap()
    }

    #[test]
    fn test_find_identity_first_match() {
        let snapshot = sample();
        assert_eq!(
            snapshot.find_identity("653638788026990593", "discord"),
            Some("N7pyNa2bp8DIA0RQYNnrmw")
        );
        assert_eq!(
            snapshot.find_identity("653638788026990593", "github"),
            Some("GithubOnly000000000000")
        );
    }

    #[test]
    fn test_find_identity_not_found() {
        let snapshot = sample();
        assert_eq!(snapshot.find_identity("123456789012345678", "discord"), None);
        assert_eq!(snapshot.find_identity("12345", "discord"), None);
        assert_eq!(snapshot.find_identity("6536387880269905931", "discord"), None);
        assert_eq!(snapshot.find_identity("", "discord"), None);
    }

    #[test]
    fn test_render_preserves_entries_and_order() {
        let lines = vec![
            alias_line("A", "discord", "111111111111111111"),
            r#"{"custom":  "spacing kept" ,"action":{"type":"SOMETHING_NEW"}}"#.to_string(),
        ];
        let document = format!("{}\n", lines.join("\n"));
        let snapshot = LedgerSnapshot::parse("v1", &document).unwrap();
        assert_eq!(snapshot.render_with(&[]), document);

        let record = ActivationRecord::new("A", 1, "id".to_string());
        let rendered = snapshot.render_with(&[record.clone()]);
        let rendered_lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(rendered_lines.len(), 3);
        assert_eq!(rendered_lines[0], lines[0]);
        assert_eq!(rendered_lines[1], lines[1]);
        assert_eq!(
            serde_json::from_str::<ActivationRecord>(rendered_lines[2]).unwrap(),
            record
        );
        assert!(rendered.ends_with('\n'));

        // The snapshot itself is untouched.
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_render_normalises_separators() {
        let first = toggle_line("First");
        let second = toggle_line("Second");
        let document = format!("{}\r\n\r\n{}\r\n", first, second);
        let snapshot = LedgerSnapshot::parse("v", &document).unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.render_with(&[]), format!("{}\n{}\n", first, second));
    }

    #[test]
    fn test_active_identities_counts_toggles() {
        let lines = [
            toggle_line("On"),
            toggle_line("Off"),
            toggle_line("Off"),
            toggle_line("On"),
            toggle_line("On"),
        ];
        let snapshot = LedgerSnapshot::parse("v", &lines.join("\n")).unwrap();
        let active = snapshot.active_identities();
        assert!(active.contains("On"));
        assert!(!active.contains("Off"));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let document = format!("{}\n\nnot json", toggle_line("A"));
        let err = LedgerSnapshot::parse("v", &document).unwrap_err();
        assert_eq!(err.line, 3);
    }
}
