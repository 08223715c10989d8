//! Server entity.

use std::collections::BTreeSet;

/// A participant in the network mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub sid: String,
    pub name: String,
    pub description: String,
    /// Hop count from us; the hub is 1.
    pub hops: u32,
    /// Feature tokens from `CAPAB` (hub) or `GCAP` (anyone).
    pub capabilities: BTreeSet<String>,
    /// SID of the server that introduced this one. `None` for the hub.
    pub uplink: Option<String>,
}

impl Server {
    pub fn new(
        sid: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        hops: u32,
        uplink: Option<String>,
    ) -> Self {
        Self {
            sid: sid.into(),
            name: name.into(),
            description: description.into(),
            hops,
            capabilities: BTreeSet::new(),
            uplink,
        }
    }

    pub fn has_cap(&self, cap: &str) -> bool {
        self.capabilities.contains(cap)
    }

    /// Replace the capability set from a space-separated token list.
    pub fn set_capabilities(&mut self, tokens: &str) {
        self.capabilities = tokens.split_whitespace().map(str::to_string).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_are_replaced_not_merged() {
        let mut server = Server::new("00A", "hub.example.net", "Hub", 1, None);
        server.set_capabilities("QS EX EUID");
        assert!(server.has_cap("EUID"));
        server.set_capabilities("QS  TB");
        assert!(!server.has_cap("EUID"));
        assert!(server.has_cap("TB"));
        assert_eq!(server.capabilities.len(), 2);
    }
}
