//! Link handshake state machine.
//!
//! Manages the transition from a fresh socket to a synchronized link:
//!
//! ```text
//! Connecting --connected()--> Registering --SERVER--> Bursting --PING--> Synchronized
//! ```
//!
//! We always initiate, so `Registering` starts by sending our own
//! `PASS`/`CAPAB`/`SERVER` and waits for the hub's.

use std::collections::BTreeSet;

use tracing::{debug, info};
use ts6_proto::irc_eq;

use crate::config::LinkBlock;
use crate::error::{LinkError, LinkResult};
use crate::state::Server;

/// Capabilities we advertise in `CAPAB`.
pub const LOCAL_CAPAB: &str = "QS EX IE KLN UNKLN ENCAP TB SERVICES EUID EOPMOD MLOCK REMOVE";

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport yet.
    Connecting,
    /// Our handshake is out; waiting for the hub's `SERVER`.
    Registering,
    /// Snapshots are being exchanged.
    Bursting,
    /// The hub pinged us after its burst; steady state.
    Synchronized,
}

impl SessionState {
    /// Whether the hub has accepted us and wire output is meaningful.
    pub fn is_linked(self) -> bool {
        matches!(self, SessionState::Bursting | SessionState::Synchronized)
    }
}

/// Handshake progress plus what the hub told us about itself.
#[derive(Debug)]
pub struct HandshakeMachine {
    pub state: SessionState,
    pub remote_sid: Option<String>,
    pub remote_pass: Option<String>,
    pub remote_capab: BTreeSet<String>,
    pub remote_name: Option<String>,

    // Local identity
    pub local_sid: String,
    pub local_name: String,
    pub local_desc: String,
}

impl HandshakeMachine {
    pub fn new(local_sid: String, local_name: String, local_desc: String) -> Self {
        Self {
            state: SessionState::Connecting,
            remote_sid: None,
            remote_pass: None,
            remote_capab: BTreeSet::new(),
            remote_name: None,
            local_sid,
            local_name,
            local_desc,
        }
    }

    /// Move to `next`, rejecting anything but a forward step.
    pub fn transition(&mut self, next: SessionState) -> LinkResult {
        use SessionState::*;
        let legal = matches!(
            (self.state, next),
            (Connecting, Registering) | (Registering, Bursting) | (Bursting, Synchronized)
        );
        if !legal {
            return Err(LinkError::ProtocolFraming(format!(
                "illegal state transition {:?} -> {:?}",
                self.state, next
            )));
        }
        debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
        Ok(())
    }

    /// Our half of the handshake: `PASS`, `CAPAB`, `SERVER`.
    pub fn greeting(&self, link: &LinkBlock) -> Vec<String> {
        vec![
            format!("PASS {} TS 6 :{}", link.password, self.local_sid),
            format!("CAPAB :{}", LOCAL_CAPAB),
            format!("SERVER {} 1 :{}", self.local_name, self.local_desc),
        ]
    }

    /// `PASS <password> TS 6 :<sid>`.
    pub fn on_pass(&mut self, params: &[String], link: &LinkBlock) -> LinkResult {
        let [pass, ts, version, sid, ..] = params else {
            return Err(LinkError::AuthFailed("PASS needs password, TS 6 and SID".into()));
        };
        if ts != "TS" || version != "6" {
            return Err(LinkError::AuthFailed(format!(
                "peer does not speak TS6 ({} {})",
                ts, version
            )));
        }
        if let Some(expected) = &link.accept_password {
            if expected != pass {
                return Err(LinkError::AuthFailed("password mismatch".into()));
            }
        }
        if let Some(expected) = &link.sid {
            if expected != sid {
                return Err(LinkError::AuthFailed(format!(
                    "expected SID {}, got {}",
                    expected, sid
                )));
            }
        }
        self.remote_pass = Some(pass.clone());
        self.remote_sid = Some(sid.clone());
        Ok(())
    }

    /// `CAPAB :<tokens>`. Repeated lines accumulate.
    pub fn on_capab(&mut self, tokens: &str) {
        self.remote_capab
            .extend(tokens.split_whitespace().map(str::to_string));
    }

    /// `SERVER <name> <hops> :<description>`. Returns the hub record to
    /// insert into the registry.
    pub fn on_server(&mut self, name: &str, description: &str, link: &LinkBlock) -> LinkResult<Server> {
        let Some(sid) = self.remote_sid.clone() else {
            return Err(LinkError::AuthFailed("SERVER before PASS".into()));
        };
        if !irc_eq(name, &link.name) {
            return Err(LinkError::AuthFailed(format!(
                "expected server {}, got {}",
                link.name, name
            )));
        }
        info!(%sid, %name, caps = self.remote_capab.len(), "hub introduced itself");
        self.remote_name = Some(name.to_string());

        let mut hub = Server::new(sid, name, description, 1, None);
        hub.capabilities = self.remote_capab.clone();
        Ok(hub)
    }

    /// The hub's SID once `PASS` has been accepted.
    pub fn hub_sid(&self) -> Option<&str> {
        self.remote_sid.as_deref()
    }

    pub fn hub_has_cap(&self, cap: &str) -> bool {
        self.remote_capab.contains(cap)
    }
}

/// `SVINFO 6 3 0 :<now>`.
pub fn svinfo(now: u64) -> String {
    format!("SVINFO 6 3 0 :{}", now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> LinkBlock {
        LinkBlock {
            name: "hub.example.net".to_string(),
            hostname: "localhost".to_string(),
            port: 6667,
            password: "secret".to_string(),
            accept_password: Some("theirs".to_string()),
            sid: Some("00A".to_string()),
            tls: false,
        }
    }

    fn machine() -> HandshakeMachine {
        HandshakeMachine::new(
            "42X".to_string(),
            "services.example.net".to_string(),
            "Services".to_string(),
        )
    }

    fn params(line: &str) -> Vec<String> {
        line.split(' ').map(str::to_string).collect()
    }

    #[test]
    fn test_handshake_flow() {
        let mut m = machine();
        m.transition(SessionState::Registering).unwrap();
        assert_eq!(
            m.greeting(&link()),
            [
                "PASS secret TS 6 :42X",
                "CAPAB :QS EX IE KLN UNKLN ENCAP TB SERVICES EUID EOPMOD MLOCK REMOVE",
                "SERVER services.example.net 1 :Services",
            ]
        );

        m.on_pass(&params("theirs TS 6 00A"), &link()).unwrap();
        m.on_capab("QS EUID");
        m.on_capab("TB");
        let hub = m.on_server("HUB.example.net", "The Hub", &link()).unwrap();
        assert_eq!(hub.sid, "00A");
        assert_eq!(hub.hops, 1);
        assert!(hub.has_cap("TB") && hub.has_cap("EUID"));
        assert!(m.hub_has_cap("QS"));

        m.transition(SessionState::Bursting).unwrap();
        m.transition(SessionState::Synchronized).unwrap();
        assert!(m.state.is_linked());
    }

    #[test]
    fn rejects_non_ts6_and_bad_credentials() {
        let mut m = machine();
        assert!(matches!(
            m.on_pass(&params("theirs TS 5 00A"), &link()),
            Err(LinkError::AuthFailed(_))
        ));
        assert!(m.on_pass(&params("wrong TS 6 00A"), &link()).is_err());
        assert!(m.on_pass(&params("theirs TS 6 00B"), &link()).is_err());
        assert!(m.on_pass(&params("theirs TS"), &link()).is_err());
        assert!(m.hub_sid().is_none());
    }

    #[test]
    fn server_requires_pass_and_expected_name() {
        let mut m = machine();
        let err = m.on_server("hub.example.net", "Hub", &link()).unwrap_err();
        assert!(err.is_fatal());

        m.on_pass(&params("theirs TS 6 00A"), &link()).unwrap();
        assert!(m.on_server("rogue.example.net", "Hub", &link()).is_err());
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut m = machine();
        assert!(m.transition(SessionState::Bursting).is_err());
        m.transition(SessionState::Registering).unwrap();
        assert!(m.transition(SessionState::Registering).is_err());
        assert_eq!(m.state, SessionState::Registering);
    }

    #[test]
    fn svinfo_format() {
        assert_eq!(svinfo(1700000000), "SVINFO 6 3 0 :1700000000");
    }
}
