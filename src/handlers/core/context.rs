//! Handler context and core types.
//!
//! `Context` is everything a verb handler may touch: the registry, the
//! handshake, the outbound queue and both event audiences. The session owns
//! exactly one, so handlers get `&mut Context` with no locking.

use std::collections::BTreeSet;
use std::fmt;

use ts6_proto::{Line, ModeTable};

use crate::config::{LimitsConfig, LinkBlock};
use crate::error::LinkResult;
use crate::events::{ClientEvent, Listeners, ServiceHooks};
use crate::state::{Matrix, Source, UidGenerator};
use crate::sync::handshake::{HandshakeMachine, SessionState};

/// Result type for handlers.
pub type HandlerResult = LinkResult;

/// A handler for one wire verb.
pub trait Handler: Send {
    /// `source` is the resolved line prefix, if the line had one.
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult;
}

/// Lines queued for the hub.
#[derive(Debug, Default)]
pub struct Outbox {
    lines: Vec<String>,
}

impl Outbox {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Handler context.
pub struct Context {
    /// Authoritative network state.
    pub matrix: Matrix,
    /// Handshake progress and the hub's identity.
    pub handshake: HandshakeMachine,
    /// The uplink we are configured for.
    pub link: LinkBlock,
    pub limits: LimitsConfig,
    /// Channel mode arity table.
    pub table: ModeTable,
    /// User mode table (every letter is a flag).
    pub umodes: ModeTable,
    pub uids: UidGenerator,
    pub listeners: Listeners,
    pub hooks: Box<dyn ServiceHooks>,
    pub out: Outbox,
    /// Unix time source; replaced in tests.
    pub clock: fn() -> u64,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("state", &self.handshake.state)
            .field("local_sid", &self.handshake.local_sid)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

/// Wall-clock Unix time.
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

impl Context {
    pub fn state(&self) -> SessionState {
        self.handshake.state
    }

    pub fn local_sid(&self) -> &str {
        &self.handshake.local_sid
    }

    pub fn local_name(&self) -> &str {
        &self.handshake.local_name
    }

    pub fn now(&self) -> u64 {
        (self.clock)()
    }

    /// Queue a line for the hub. Dropped until the hub has accepted us;
    /// anything earlier reaches it through the burst.
    pub fn send(&mut self, line: impl Into<String>) {
        if self.handshake.state.is_linked() {
            self.out.push(line);
        }
    }

    /// Queue a line regardless of state (handshake traffic).
    pub fn send_raw(&mut self, line: impl Into<String>) {
        self.out.push(line);
    }

    /// Display name for a SID or UID: the nick for clients, the server name
    /// for servers, the token itself if unknown.
    pub fn display_name(&self, id: &str) -> String {
        if let Ok(client) = self.matrix.client(id) {
            client.nick.clone()
        } else if let Ok(server) = self.matrix.server(id) {
            server.name.clone()
        } else {
            id.to_string()
        }
    }

    // ------------------------------------------------------------------
    // Local fan-out
    // ------------------------------------------------------------------

    /// Deliver to one locally-owned client.
    pub fn notify(&mut self, uid: &str, event: &ClientEvent) {
        self.listeners.deliver(uid, event);
    }

    /// Deliver to every locally-owned member of `channel` in membership
    /// order, skipping `except`. Remote members get nothing.
    pub fn notify_channel(&mut self, channel: &str, except: Option<&str>, event: &ClientEvent) {
        let Ok(chan) = self.matrix.channel(channel) else {
            return;
        };
        let targets: Vec<String> = chan
            .members()
            .iter()
            .map(|m| m.uid.clone())
            .filter(|uid| Some(uid.as_str()) != except && self.matrix.is_local(uid))
            .collect();
        for uid in targets {
            self.listeners.deliver(&uid, event);
        }
    }

    /// Deliver once to each locally-owned client sharing any of `channels`
    /// with `subject`, excluding `subject` itself.
    pub fn notify_common(&mut self, subject: &str, channels: &[String], event: &ClientEvent) {
        let mut seen = BTreeSet::new();
        let mut targets = Vec::new();
        for key in channels {
            let Ok(chan) = self.matrix.channel(key) else {
                continue;
            };
            for member in chan.members() {
                if member.uid != subject
                    && self.matrix.is_local(&member.uid)
                    && seen.insert(member.uid.clone())
                {
                    targets.push(member.uid.clone());
                }
            }
        }
        for uid in targets {
            self.listeners.deliver(&uid, event);
        }
    }
}
