//! Event interfaces between the session and service logic.
//!
//! Two audiences consume session output:
//! - each locally-owned client has one [`ClientListener`], called in-process
//!   for traffic that concerns it
//! - [`ServiceHooks`] receives network-level notifications (introductions,
//!   logins, burst boundaries, splits, bans)
//!
//! An `UnboundedSender<SessionEvent>` implements both, so service logic can
//! consume everything from a single queue.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;
use ts6_proto::ModeChange;

use crate::state::{Client, Kline, Server};

/// Something that happened to, or in view of, a locally-owned client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// This client joined `channel`.
    Joined { channel: String },
    /// Another client joined a channel this client is in.
    UserJoined { channel: String, uid: String },
    /// This client left `channel`.
    Left { channel: String, reason: Option<String> },
    /// Another client parted a shared channel.
    UserLeft {
        channel: String,
        uid: String,
        reason: Option<String>,
    },
    /// `target` is a channel name, or this client's nick for a private message.
    Privmsg {
        from: String,
        target: String,
        text: String,
    },
    Notice {
        from: String,
        target: String,
        text: String,
    },
    ModeChanged {
        channel: String,
        setter: String,
        change: ModeChange,
    },
    TopicUpdated {
        channel: String,
        setter: String,
        text: String,
    },
    /// This client was kicked.
    Kicked {
        channel: String,
        by: String,
        reason: String,
    },
    /// Another member was kicked from a shared channel.
    UserKicked {
        channel: String,
        uid: String,
        by: String,
        reason: String,
    },
    /// A client sharing a channel quit.
    UserQuit {
        uid: String,
        nick: String,
        reason: String,
    },
    /// A client sharing a channel changed nick.
    NickChanged {
        uid: String,
        old: String,
        new: String,
    },
    /// This client was removed from the network.
    Quit { reason: String },
}

/// Receives events for one locally-owned client.
pub trait ClientListener: Send {
    /// `me` is the UID of the client the listener is attached to.
    fn on_event(&mut self, me: &str, event: &ClientEvent);
}

/// Network-level notifications for service logic. Every method defaults to
/// a no-op.
#[allow(unused_variables)]
pub trait ServiceHooks: Send {
    fn client_introduced(&mut self, client: &Client) {}
    /// `client.login` holds the new account, `None` on logout.
    fn login_changed(&mut self, client: &Client) {}
    fn burst_started(&mut self) {}
    fn burst_ended(&mut self) {}
    fn server_split(&mut self, server: &Server, reason: &str) {}
    fn kline_added(&mut self, kline: &Kline) {}
    fn kline_removed(&mut self, kline: &Kline) {}
}

/// Hooks that ignore everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl ServiceHooks for NoHooks {}

/// Everything the session publishes, flattened for a single queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Client { uid: String, event: ClientEvent },
    ClientIntroduced { uid: String, nick: String },
    LoginChanged { uid: String, account: Option<String> },
    BurstStarted,
    BurstEnded,
    ServerSplit { sid: String, name: String },
    KlineAdded(Kline),
    KlineRemoved(Kline),
}

// A closed receiver means service logic is gone; the session keeps its
// state regardless, so send errors are ignored.
impl ClientListener for mpsc::UnboundedSender<SessionEvent> {
    fn on_event(&mut self, me: &str, event: &ClientEvent) {
        let _ = self.send(SessionEvent::Client {
            uid: me.to_string(),
            event: event.clone(),
        });
    }
}

impl ServiceHooks for mpsc::UnboundedSender<SessionEvent> {
    fn client_introduced(&mut self, client: &Client) {
        let _ = self.send(SessionEvent::ClientIntroduced {
            uid: client.uid.clone(),
            nick: client.nick.clone(),
        });
    }

    fn login_changed(&mut self, client: &Client) {
        let _ = self.send(SessionEvent::LoginChanged {
            uid: client.uid.clone(),
            account: client.login.clone(),
        });
    }

    fn burst_started(&mut self) {
        let _ = self.send(SessionEvent::BurstStarted);
    }

    fn burst_ended(&mut self) {
        let _ = self.send(SessionEvent::BurstEnded);
    }

    fn server_split(&mut self, server: &Server, _reason: &str) {
        let _ = self.send(SessionEvent::ServerSplit {
            sid: server.sid.clone(),
            name: server.name.clone(),
        });
    }

    fn kline_added(&mut self, kline: &Kline) {
        let _ = self.send(SessionEvent::KlineAdded(kline.clone()));
    }

    fn kline_removed(&mut self, kline: &Kline) {
        let _ = self.send(SessionEvent::KlineRemoved(kline.clone()));
    }
}

/// One listener per locally-owned client, keyed by UID.
#[derive(Default)]
pub struct Listeners {
    by_uid: HashMap<String, Box<dyn ClientListener>>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("uids", &self.by_uid.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Listeners {
    pub fn attach(&mut self, uid: impl Into<String>, listener: Box<dyn ClientListener>) {
        self.by_uid.insert(uid.into(), listener);
    }

    pub fn detach(&mut self, uid: &str) -> Option<Box<dyn ClientListener>> {
        self.by_uid.remove(uid)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.by_uid.contains_key(uid)
    }

    /// Call the listener for `uid`. Returns `false` if none is attached.
    pub fn deliver(&mut self, uid: &str, event: &ClientEvent) -> bool {
        match self.by_uid.get_mut(uid) {
            Some(listener) => {
                listener.on_event(uid, event);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_listener_tags_events_with_uid() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut listeners = Listeners::default();
        listeners.attach("42XAAAAAA", Box::new(tx));

        let event = ClientEvent::Joined {
            channel: "#test".into(),
        };
        assert!(listeners.deliver("42XAAAAAA", &event));
        assert!(!listeners.deliver("42XAAAAAB", &event));

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::Client {
                uid: "42XAAAAAA".into(),
                event,
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn sender_hooks_flatten_into_events() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        let mut client = Client::new("00AAAAAAA", "alice", "a", "h", "g", 1, "00A");
        client.login = Some("alice".into());
        ServiceHooks::login_changed(&mut tx, &client);
        ServiceHooks::burst_ended(&mut tx);
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::LoginChanged {
                uid: "00AAAAAAA".into(),
                account: Some("alice".into()),
            }
        );
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::BurstEnded);
    }

    #[test]
    fn detached_listener_stops_receiving() {
        let (tx, _rx) = mpsc::unbounded_channel::<SessionEvent>();
        let mut listeners = Listeners::default();
        listeners.attach("42XAAAAAA", Box::new(tx));
        assert!(listeners.detach("42XAAAAAA").is_some());
        assert!(!listeners.contains("42XAAAAAA"));
    }
}
