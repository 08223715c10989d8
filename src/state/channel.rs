//! Channel-related types and state.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use ts6_proto::{ModeChange, ModeClass, ModeTable};

/// Channel topic with metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub text: String,
    pub setter: String,
    pub ts: u64,
}

/// A channel member and its status letters (`o`, `v`, ...), highest rank first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub uid: String,
    pub status: String,
}

impl Member {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            status: String::new(),
        }
    }

    pub fn has(&self, letter: char) -> bool {
        self.status.contains(letter)
    }

    /// Set or clear one status letter, keeping rank order.
    pub fn set_status(&mut self, table: &ModeTable, letter: char, on: bool) {
        if on == self.has(letter) {
            return;
        }
        let mut letters: Vec<char> = self.status.chars().collect();
        if on {
            letters.push(letter);
            letters.sort_by_key(|l| table.prefix_rank(*l).unwrap_or(usize::MAX));
        } else {
            letters.retain(|l| *l != letter);
        }
        self.status = letters.into_iter().collect();
    }

    /// Status as wire symbols, e.g. `@+`.
    pub fn symbols(&self, table: &ModeTable) -> String {
        self.status
            .chars()
            .filter_map(|l| table.symbol_for_letter(l))
            .collect()
    }
}

/// Channel mode bookkeeping: which letters are set, with their parameters.
///
/// Member status letters live on [`Member`], not here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelModes {
    flags: BTreeMap<char, Option<String>>,
    lists: BTreeMap<char, BTreeSet<String>>,
}

impl ChannelModes {
    pub fn is_set(&self, letter: char) -> bool {
        self.flags.contains_key(&letter)
    }

    pub fn param(&self, letter: char) -> Option<&str> {
        self.flags.get(&letter).and_then(|p| p.as_deref())
    }

    pub fn list(&self, letter: char) -> impl Iterator<Item = &str> {
        self.lists.get(&letter).into_iter().flatten().map(String::as_str)
    }

    /// Letters of every non-empty list mode.
    pub fn list_letters(&self) -> impl Iterator<Item = char> + '_ {
        self.lists
            .iter()
            .filter(|(_, masks)| !masks.is_empty())
            .map(|(letter, _)| *letter)
    }

    /// Set (non-list) letters.
    pub fn letters(&self) -> BTreeSet<char> {
        self.flags.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.lists.values().all(BTreeSet::is_empty)
    }

    pub fn set(&mut self, letter: char, param: Option<String>) {
        self.flags.insert(letter, param);
    }

    pub fn unset(&mut self, letter: char) {
        self.flags.remove(&letter);
    }

    pub fn add_mask(&mut self, letter: char, mask: impl Into<String>) {
        self.lists.entry(letter).or_default().insert(mask.into());
    }

    pub fn remove_mask(&mut self, letter: char, mask: &str) {
        if let Some(masks) = self.lists.get_mut(&letter) {
            masks.remove(mask);
            if masks.is_empty() {
                self.lists.remove(&letter);
            }
        }
    }

    pub fn clear(&mut self) {
        self.flags.clear();
        self.lists.clear();
    }

    /// Simple modes as `+letters` plus their parameters; list modes excluded.
    pub fn render(&self) -> (String, Vec<String>) {
        let mut letters = String::from("+");
        let mut params = Vec::new();
        for (letter, param) in &self.flags {
            letters.push(*letter);
            if let Some(param) = param {
                params.push(param.clone());
            }
        }
        (letters, params)
    }
}

/// Network-wide channel state as seen by this peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Display name; lookups use the folded form.
    pub name: String,
    pub ts: u64,
    pub modes: ChannelModes,
    pub topic: Option<Topic>,
    members: Vec<Member>,
}

impl Channel {
    pub fn new(name: impl Into<String>, ts: u64) -> Self {
        Self {
            name: name.into(),
            ts,
            modes: ChannelModes::default(),
            topic: None,
            members: Vec::new(),
        }
    }

    /// Members in join order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, uid: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.uid == uid)
    }

    pub fn is_member(&self, uid: &str) -> bool {
        self.member(uid).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Permanent channels (`+P`) outlive their last member.
    pub fn is_permanent(&self) -> bool {
        self.modes.is_set('P')
    }

    /// Add a member, or merge `status` into an existing one.
    /// Returns `true` when the member is new.
    pub fn add_member(&mut self, table: &ModeTable, uid: &str, status: &str) -> bool {
        let (member, added) = match self.members.iter().position(|m| m.uid == uid) {
            Some(idx) => (&mut self.members[idx], false),
            None => {
                self.members.push(Member::new(uid));
                let last = self.members.len() - 1;
                (&mut self.members[last], true)
            }
        };
        for letter in status.chars() {
            member.set_status(table, letter, true);
        }
        added
    }

    /// Returns `true` when the member was present.
    pub fn remove_member(&mut self, uid: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.uid != uid);
        self.members.len() != before
    }

    /// Apply a parsed mode change on top of the current state.
    ///
    /// Status letters whose target is not a member are skipped.
    pub fn apply_modes(&mut self, table: &ModeTable, change: &ModeChange) {
        for (adding, side) in [(true, &change.added), (false, &change.removed)] {
            for (letter, param) in side {
                self.apply_one(table, *letter, param.as_deref(), adding);
            }
        }
    }

    fn apply_one(&mut self, table: &ModeTable, letter: char, param: Option<&str>, adding: bool) {
        match (table.classify(letter), param) {
            (Some(ModeClass::Prefix), Some(uid)) => {
                match self.members.iter_mut().find(|m| m.uid == uid) {
                    Some(member) => member.set_status(table, letter, adding),
                    None => debug!(channel = %self.name, %uid, %letter, "status for non-member"),
                }
            }
            (Some(ModeClass::List), Some(mask)) => {
                if adding {
                    self.modes.add_mask(letter, mask);
                } else {
                    self.modes.remove_mask(letter, mask);
                }
            }
            _ if adding => self.modes.set(letter, param.map(str::to_string)),
            _ => self.modes.unset(letter),
        }
    }

    /// A TS change: adopt the older `ts`, drop every mode and every
    /// member status. The topic and membership survive.
    pub fn reset_ts(&mut self, ts: u64) {
        self.ts = ts;
        self.modes.clear();
        for member in &mut self.members {
            member.status.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts6_proto::parse_modes;

    fn table() -> ModeTable {
        ModeTable::default()
    }

    fn apply(chan: &mut Channel, modes: &str, args: &[&str]) {
        let change = parse_modes(&table(), modes, args).unwrap();
        chan.apply_modes(&table(), &change);
    }

    // ========================================================================
    // Membership
    // ========================================================================

    #[test]
    fn add_member_is_idempotent_and_ordered() {
        let mut chan = Channel::new("#test", 100);
        assert!(chan.add_member(&table(), "00AAAAAAA", ""));
        assert!(chan.add_member(&table(), "00AAAAAAB", ""));
        assert!(!chan.add_member(&table(), "00AAAAAAA", ""));
        let uids: Vec<_> = chan.members().iter().map(|m| m.uid.as_str()).collect();
        assert_eq!(uids, ["00AAAAAAA", "00AAAAAAB"]);
    }

    #[test]
    fn readding_merges_status() {
        let mut chan = Channel::new("#test", 100);
        chan.add_member(&table(), "00AAAAAAA", "v");
        chan.add_member(&table(), "00AAAAAAA", "o");
        let member = chan.member("00AAAAAAA").unwrap();
        assert_eq!(member.status, "ov");
        assert_eq!(member.symbols(&table()), "@+");
    }

    #[test]
    fn remove_member_reports_presence() {
        let mut chan = Channel::new("#test", 100);
        chan.add_member(&table(), "00AAAAAAA", "");
        assert!(chan.remove_member("00AAAAAAA"));
        assert!(!chan.remove_member("00AAAAAAA"));
        assert!(chan.is_empty());
    }

    // ========================================================================
    // Mode bookkeeping
    // ========================================================================

    #[test]
    fn flags_params_and_lists() {
        let mut chan = Channel::new("#test", 100);
        apply(&mut chan, "+ntkl", &["key", "10"]);
        apply(&mut chan, "+b", &["*!*@bad"]);
        assert!(chan.modes.is_set('n'));
        assert_eq!(chan.modes.param('k'), Some("key"));
        assert_eq!(chan.modes.list('b').collect::<Vec<_>>(), ["*!*@bad"]);

        apply(&mut chan, "-lk-b", &["key", "*!*@bad"]);
        assert!(!chan.modes.is_set('l'));
        assert!(!chan.modes.is_set('k'));
        assert_eq!(chan.modes.list('b').count(), 0);
        assert_eq!(chan.modes.render(), ("+nt".to_string(), vec![]));
    }

    #[test]
    fn status_modes_target_members() {
        let mut chan = Channel::new("#test", 100);
        chan.add_member(&table(), "00AAAAAAA", "");
        apply(&mut chan, "+ov", &["00AAAAAAA", "00AAAAAAZ"]);
        assert_eq!(chan.member("00AAAAAAA").unwrap().status, "o");
        assert!(chan.member("00AAAAAAZ").is_none());
        assert!(chan.modes.letters().is_empty());

        apply(&mut chan, "-o", &["00AAAAAAA"]);
        assert_eq!(chan.member("00AAAAAAA").unwrap().status, "");
    }

    #[test]
    fn reset_ts_strips_modes_and_status() {
        let mut chan = Channel::new("#test", 100);
        chan.add_member(&table(), "00AAAAAAA", "o");
        apply(&mut chan, "+ntb", &["*!*@x"]);
        chan.topic = Some(Topic {
            text: "hi".into(),
            setter: "alice".into(),
            ts: 90,
        });

        chan.reset_ts(50);
        assert_eq!(chan.ts, 50);
        assert!(chan.modes.is_empty());
        assert_eq!(chan.member("00AAAAAAA").unwrap().status, "");
        assert!(chan.topic.is_some());
    }

    #[test]
    fn permanent_flag() {
        let mut chan = Channel::new("#test", 100);
        assert!(!chan.is_permanent());
        apply(&mut chan, "+P", &[]);
        assert!(chan.is_permanent());
    }
}
