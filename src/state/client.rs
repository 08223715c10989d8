//! Client entity.

use std::collections::BTreeSet;
use ts6_proto::ModeChange;

/// A network-wide user, local or remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    /// 9-character UID. Never changes.
    pub uid: String,
    pub nick: String,
    pub user: String,
    /// Real host.
    pub host: String,
    /// Host shown to other users.
    pub visible_host: String,
    pub ip: String,
    pub gecos: String,
    /// Nick timestamp.
    pub ts: u64,
    pub modes: BTreeSet<char>,
    /// Account name.
    pub login: Option<String>,
    /// SID of the owning server.
    pub server: String,
    pub identified: bool,
    pub away: Option<String>,
    /// Folded names of joined channels.
    pub channels: BTreeSet<String>,
    /// Introduced and puppeted by this process.
    pub local: bool,
}

impl Client {
    /// A remote client with no modes, login or channels.
    pub fn new(
        uid: impl Into<String>,
        nick: impl Into<String>,
        user: impl Into<String>,
        host: impl Into<String>,
        gecos: impl Into<String>,
        ts: u64,
        server: impl Into<String>,
    ) -> Self {
        let host = host.into();
        Self {
            uid: uid.into(),
            nick: nick.into(),
            user: user.into(),
            visible_host: host.clone(),
            host,
            ip: "0".to_string(),
            gecos: gecos.into(),
            ts,
            modes: BTreeSet::new(),
            login: None,
            server: server.into(),
            identified: false,
            away: None,
            channels: BTreeSet::new(),
            local: false,
        }
    }

    /// `nick!user@visible_host`.
    pub fn mask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.user, self.visible_host)
    }

    /// `+` followed by the set letters.
    pub fn mode_string(&self) -> String {
        std::iter::once('+').chain(self.modes.iter().copied()).collect()
    }

    pub fn apply_modes(&mut self, change: &ModeChange) {
        for (letter, _) in &change.added {
            self.modes.insert(*letter);
        }
        for (letter, _) in &change.removed {
            self.modes.remove(letter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts6_proto::{ModeTable, parse_modes};

    fn client() -> Client {
        Client::new("00AAAAAAB", "alice", "al", "host.example", "Alice", 100, "00A")
    }

    #[test]
    fn visible_host_defaults_to_real_host() {
        let c = client();
        assert_eq!(c.visible_host, "host.example");
        assert_eq!(c.mask(), "alice!al@host.example");
    }

    #[test]
    fn user_modes_apply_in_order() {
        let mut c = client();
        let table = ModeTable::user_modes();
        let no_args: &[&str] = &[];
        c.apply_modes(&parse_modes(&table, "+iwx", no_args).unwrap());
        c.apply_modes(&parse_modes(&table, "-w+o", no_args).unwrap());
        assert_eq!(c.mode_string(), "+iox");
    }
}
