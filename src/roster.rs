//! Guild roster snapshots and free-text member resolution.

use serde::Deserialize;
use std::collections::HashMap;

/// Static table mapping a platform handle to one or more human-readable
/// names, possibly in several languages. Immutable configuration; members
/// pick these up when a roster snapshot is taken.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: HashMap<String, Vec<String>>,
}

impl AliasTable {
    pub fn new(entries: HashMap<String, Vec<String>>) -> Self {
        Self { entries }
    }

    /// Aliases configured for a handle, empty when the handle has none.
    pub fn aliases_for(&self, handle: &str) -> &[String] {
        self.entries.get(handle).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A member of a shared surface, resolved to the names it can be addressed
/// by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: u64,
    pub handle: String,
    pub display_name: String,
    pub nickname: Option<String>,
    pub aliases: Vec<String>,
}

impl Identity {
    /// Roster line for the model context: display name, the handle in
    /// parentheses when it differs, then any known aliases.
    pub fn describe(&self) -> String {
        let mut line = self.display_name.clone();
        if self.handle != self.display_name {
            line.push_str(&format!(" ({})", self.handle));
        }
        if !self.aliases.is_empty() {
            line.push_str(&format!(" also known as: {}", self.aliases.join(", ")));
        }
        line
    }

    fn matches_exact(&self, needle: &str) -> bool {
        self.handle.to_lowercase() == needle
            || self.display_name.to_lowercase() == needle
            || self
                .nickname
                .as_deref()
                .is_some_and(|nickname| nickname.to_lowercase() == needle)
    }

    fn matches_alias(&self, needle: &str) -> bool {
        self.aliases
            .iter()
            .any(|alias| alias.to_lowercase() == needle)
    }

    fn matches_loose(&self, needle: &str) -> bool {
        self.name_fields().any(|name| {
            let lower = name.to_lowercase();
            lower.contains(needle) || needle.contains(&lower)
        })
    }

    fn name_fields(&self) -> impl Iterator<Item = &str> {
        [
            Some(self.handle.as_str()),
            Some(self.display_name.as_str()),
            self.nickname.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Point-in-time listing of the non-automated members of a shared surface.
/// Recomputed for every context assembly; membership can change between
/// calls, so nothing here is cached.
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    members: Vec<Identity>,
}

impl RosterSnapshot {
    pub fn new(members: Vec<Identity>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[Identity] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Look a member up by platform user id.
    pub fn by_user_id(&self, user_id: u64) -> Option<&Identity> {
        self.members.iter().find(|member| member.user_id == user_id)
    }

    /// Resolve a free-text name to a member.
    ///
    /// Precedence, all case-insensitive: exact handle/display/nickname
    /// match, then exact alias match, then substring in either direction,
    /// a deliberately loose fallback that tolerates minor misspellings in
    /// model output. No match is a normal outcome, not an error.
    pub fn find(&self, raw_name: &str) -> Option<&Identity> {
        let needle = raw_name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        self.members
            .iter()
            .find(|member| member.matches_exact(&needle))
            .or_else(|| {
                self.members
                    .iter()
                    .find(|member| member.matches_alias(&needle))
            })
            .or_else(|| {
                self.members
                    .iter()
                    .find(|member| member.matches_loose(&needle))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(user_id: u64, handle: &str, display: &str, aliases: &[&str]) -> Identity {
        Identity {
            user_id,
            handle: handle.to_string(),
            display_name: display.to_string(),
            nickname: None,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn roster() -> RosterSnapshot {
        RosterSnapshot::new(vec![
            member(1, "alice", "Alice", &["Wonder"]),
            member(2, "bob_42", "Bobby", &[]),
            member(3, "carol", "carol", &["แครอล"]),
        ])
    }

    #[test]
    fn test_find_by_handle_and_alias_resolve_same_member() {
        let roster = roster();
        let by_handle = roster.find("alice").expect("handle match");
        let by_alias = roster.find("Wonder").expect("alias match");
        assert_eq!(by_handle, by_alias);
        assert_eq!(by_handle.user_id, 1);
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let roster = roster();
        assert_eq!(roster.find("BOBBY").map(|m| m.user_id), Some(2));
        assert_eq!(roster.find("wonder").map(|m| m.user_id), Some(1));
    }

    #[test]
    fn test_find_non_ascii_alias() {
        let roster = roster();
        assert_eq!(roster.find("แครอล").map(|m| m.user_id), Some(3));
    }

    #[test]
    fn test_exact_match_wins_over_substring() {
        // "carol" is an exact handle even though it is also a substring of
        // other fields; exact must win without falling through.
        let roster = RosterSnapshot::new(vec![
            member(1, "carolina", "Carolina", &[]),
            member(2, "carol", "carol", &[]),
        ]);
        assert_eq!(roster.find("carol").map(|m| m.user_id), Some(2));
    }

    #[test]
    fn test_substring_fallback_both_directions() {
        let roster = roster();
        // needle contained in a field
        assert_eq!(roster.find("bob").map(|m| m.user_id), Some(2));
        // field contained in the needle (misspelled/extended form)
        assert_eq!(roster.find("alice!!").map(|m| m.user_id), Some(1));
    }

    #[test]
    fn test_nickname_resolves() {
        let mut with_nick = member(7, "dave", "Dave", &[]);
        with_nick.nickname = Some("The Architect".to_string());
        let roster = RosterSnapshot::new(vec![with_nick]);
        assert_eq!(roster.find("the architect").map(|m| m.user_id), Some(7));
    }

    #[test]
    fn test_not_found_is_none() {
        let roster = roster();
        assert!(roster.find("nonexistent").is_none());
        assert!(roster.find("").is_none());
        assert!(RosterSnapshot::default().find("alice").is_none());
    }

    #[test]
    fn test_describe_includes_handle_and_aliases() {
        let roster = roster();
        let alice = roster.find("alice").unwrap();
        assert_eq!(alice.describe(), "Alice (alice) also known as: Wonder");

        let carol = roster.find("carol").unwrap();
        // handle equals display name, so no parenthesized repeat
        assert_eq!(carol.describe(), "carol also known as: แครอล");
    }

    #[test]
    fn test_alias_table_lookup() {
        let table = AliasTable::new(HashMap::from([(
            "alice".to_string(),
            vec!["Wonder".to_string(), "วันเดอร์".to_string()],
        )]));
        assert_eq!(table.aliases_for("alice").len(), 2);
        assert!(table.aliases_for("unknown").is_empty());
    }
}
