//! The State Registry.
//!
//! `Matrix` exclusively owns every server, client and channel record known
//! to one session. Channels refer to members by UID and clients refer to
//! their server by SID; neither owns the other.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};
use ts6_proto::{ModeTable, irc_to_lower};

use super::{Channel, Client, Server};
use crate::error::{LinkError, LinkResult};

/// Origin of a line, resolved once at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A server, by SID.
    Server(String),
    /// A client, by UID.
    Client(String),
}

impl Source {
    /// The SID or UID this source names.
    pub fn id(&self) -> &str {
        match self {
            Source::Server(sid) => sid,
            Source::Client(uid) => uid,
        }
    }
}

/// Target of a message or mode change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A client, by UID.
    Client(String),
    /// A channel, by folded name.
    Channel(String),
}

/// A network ban recorded from `KLINE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kline {
    pub user: String,
    pub host: String,
    /// Seconds; 0 is permanent.
    pub duration: u64,
    pub reason: String,
    pub setter: String,
}

/// Shape test for `[0-9][A-Z0-9]{2}`.
pub fn is_sid(token: &str) -> bool {
    token.len() == 3 && token.as_bytes()[0].is_ascii_digit()
}

/// Shape test for `[0-9][A-Z0-9]{8}`.
pub fn is_uid(token: &str) -> bool {
    token.len() == 9 && token.as_bytes()[0].is_ascii_digit()
}

pub fn is_channel_name(token: &str) -> bool {
    token.starts_with('#') || token.starts_with('&')
}

/// Authoritative entity collection for one session.
#[derive(Debug, Default)]
pub struct Matrix {
    servers: HashMap<String, Server>,
    /// Folded name → SID.
    server_names: HashMap<String, String>,
    clients: HashMap<String, Client>,
    /// Folded nick → UID.
    nicks: HashMap<String, String>,
    /// Folded name → channel.
    channels: HashMap<String, Channel>,
    /// Locally-owned UIDs in introduction order.
    locals: Vec<String>,
    klines: BTreeMap<(String, String), Kline>,
}

fn unknown(kind: &str, key: &str) -> LinkError {
    LinkError::UnknownEntity(format!("{} {}", kind, key))
}

impl Matrix {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Identity resolution
    // ------------------------------------------------------------------

    /// Resolve a wire source token by shape: SID, UID, dotted server name,
    /// or bare nick.
    pub fn resolve_source(&self, token: &str) -> LinkResult<Source> {
        if is_sid(token) {
            self.server(token).map(|s| Source::Server(s.sid.clone()))
        } else if is_uid(token) {
            self.client(token).map(|c| Source::Client(c.uid.clone()))
        } else if token.contains('.') {
            self.server_by_name(token).map(|s| Source::Server(s.sid.clone()))
        } else {
            self.client_by_nick(token).map(|c| Source::Client(c.uid.clone()))
        }
    }

    /// Resolve a message or mode target to a channel or a client.
    pub fn resolve_destination(&self, token: &str) -> LinkResult<Destination> {
        if is_channel_name(token) {
            let key = irc_to_lower(token);
            if self.channels.contains_key(&key) {
                Ok(Destination::Channel(key))
            } else {
                Err(unknown("channel", token))
            }
        } else if is_uid(token) {
            self.client(token).map(|c| Destination::Client(c.uid.clone()))
        } else {
            self.client_by_nick(token)
                .map(|c| Destination::Client(c.uid.clone()))
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn server(&self, sid: &str) -> LinkResult<&Server> {
        self.servers.get(sid).ok_or_else(|| unknown("server", sid))
    }

    pub fn server_mut(&mut self, sid: &str) -> LinkResult<&mut Server> {
        self.servers.get_mut(sid).ok_or_else(|| unknown("server", sid))
    }

    pub fn server_by_name(&self, name: &str) -> LinkResult<&Server> {
        self.server_names
            .get(&irc_to_lower(name))
            .and_then(|sid| self.servers.get(sid))
            .ok_or_else(|| unknown("server", name))
    }

    /// Look a server up by SID or by name.
    pub fn find_server(&self, token: &str) -> LinkResult<&Server> {
        if is_sid(token) {
            self.server(token)
        } else {
            self.server_by_name(token)
        }
    }

    pub fn client(&self, uid: &str) -> LinkResult<&Client> {
        self.clients.get(uid).ok_or_else(|| unknown("client", uid))
    }

    pub fn client_mut(&mut self, uid: &str) -> LinkResult<&mut Client> {
        self.clients.get_mut(uid).ok_or_else(|| unknown("client", uid))
    }

    pub fn client_by_nick(&self, nick: &str) -> LinkResult<&Client> {
        self.nicks
            .get(&irc_to_lower(nick))
            .and_then(|uid| self.clients.get(uid))
            .ok_or_else(|| unknown("nick", nick))
    }

    /// Look a client up by UID or by nick.
    pub fn find_client(&self, token: &str) -> LinkResult<&Client> {
        if is_uid(token) {
            self.client(token)
        } else {
            self.client_by_nick(token)
        }
    }

    /// Look a channel up by any casing of its name.
    pub fn channel(&self, name: &str) -> LinkResult<&Channel> {
        self.channels
            .get(&irc_to_lower(name))
            .ok_or_else(|| unknown("channel", name))
    }

    pub fn channel_mut(&mut self, name: &str) -> LinkResult<&mut Channel> {
        self.channels
            .get_mut(&irc_to_lower(name))
            .ok_or_else(|| unknown("channel", name))
    }

    pub fn servers(&self) -> impl Iterator<Item = &Server> {
        self.servers.values()
    }

    pub fn clients(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Locally-owned clients in introduction order.
    pub fn local_clients(&self) -> Vec<&Client> {
        self.locals
            .iter()
            .filter_map(|uid| self.clients.get(uid))
            .collect()
    }

    pub fn is_local(&self, uid: &str) -> bool {
        self.clients.get(uid).is_some_and(|c| c.local)
    }

    // ------------------------------------------------------------------
    // Servers
    // ------------------------------------------------------------------

    /// Insert a server. A SID or name already present means we and the
    /// peer disagree about the network, which is fatal.
    pub fn add_server(&mut self, server: Server) -> LinkResult {
        let folded = irc_to_lower(&server.name);
        if self.servers.contains_key(&server.sid) {
            return Err(LinkError::DuplicateKey {
                kind: "sid",
                key: server.sid,
            });
        }
        if self.server_names.contains_key(&folded) {
            return Err(LinkError::DuplicateKey {
                kind: "server name",
                key: server.name,
            });
        }
        debug!(sid = %server.sid, name = %server.name, "server added");
        self.server_names.insert(folded, server.sid.clone());
        self.servers.insert(server.sid.clone(), server);
        Ok(())
    }

    /// Remove `sid`, every server behind it, and every client they own.
    ///
    /// Returns the removed clients together with the folded names of the
    /// channels each one was in.
    pub fn squit(&mut self, sid: &str) -> LinkResult<Vec<(Client, Vec<String>)>> {
        self.server(sid)?;

        let mut doomed = vec![sid.to_string()];
        let mut idx = 0;
        while idx < doomed.len() {
            let parent = doomed[idx].clone();
            doomed.extend(
                self.servers
                    .values()
                    .filter(|s| s.uplink.as_deref() == Some(parent.as_str()))
                    .map(|s| s.sid.clone()),
            );
            idx += 1;
        }

        let mut uids: Vec<String> = self
            .clients
            .values()
            .filter(|c| doomed.contains(&c.server))
            .map(|c| c.uid.clone())
            .collect();
        uids.sort();

        let mut removed = Vec::with_capacity(uids.len());
        for uid in uids {
            removed.push(self.quit_client(&uid)?);
        }
        for sid in &doomed {
            if let Some(server) = self.servers.remove(sid) {
                self.server_names.remove(&irc_to_lower(&server.name));
                debug!(sid = %server.sid, name = %server.name, "server removed");
            }
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Clients
    // ------------------------------------------------------------------

    /// Insert a client. A UID already present is fatal. A nick already
    /// indexed is re-pointed at the newcomer; the hub resolves the
    /// collision with a `KILL` or `NICK`.
    pub fn add_client(&mut self, client: Client) -> LinkResult {
        if self.clients.contains_key(&client.uid) {
            return Err(LinkError::DuplicateKey {
                kind: "uid",
                key: client.uid,
            });
        }
        if let Some(prev) = self.nicks.insert(irc_to_lower(&client.nick), client.uid.clone()) {
            warn!(nick = %client.nick, old = %prev, new = %client.uid, "nick collision");
        }
        if client.local {
            self.locals.push(client.uid.clone());
        }
        self.clients.insert(client.uid.clone(), client);
        Ok(())
    }

    /// Delete the client record and its nick entry. Channel membership is
    /// the caller's business; see [`Matrix::quit_client`].
    pub fn remove_client(&mut self, uid: &str) -> LinkResult<Client> {
        let client = self.clients.remove(uid).ok_or_else(|| unknown("client", uid))?;
        if client.local {
            self.locals.retain(|local| local != uid);
        }
        let folded = irc_to_lower(&client.nick);
        if self.nicks.get(&folded).is_some_and(|owner| owner == uid) {
            self.nicks.remove(&folded);
        }
        Ok(client)
    }

    /// Leave every channel, then remove the client.
    pub fn quit_client(&mut self, uid: &str) -> LinkResult<(Client, Vec<String>)> {
        let keys: Vec<String> = self.client(uid)?.channels.iter().cloned().collect();
        for key in &keys {
            self.part(uid, key)?;
        }
        let client = self.remove_client(uid)?;
        Ok((client, keys))
    }

    /// Change a client's nick and adopt `ts` as its new nick timestamp.
    /// Returns the old nick.
    pub fn rename_client(&mut self, uid: &str, nick: &str, ts: u64) -> LinkResult<String> {
        let client = self.clients.get_mut(uid).ok_or_else(|| unknown("client", uid))?;
        let old = std::mem::replace(&mut client.nick, nick.to_string());
        client.ts = ts;

        let old_folded = irc_to_lower(&old);
        if self.nicks.get(&old_folded).is_some_and(|owner| owner == uid) {
            self.nicks.remove(&old_folded);
        }
        self.nicks.insert(irc_to_lower(nick), uid.to_string());
        Ok(old)
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    /// Create the channel with `ts` unless it already exists. Returns
    /// `true` when it was created.
    pub fn ensure_channel(&mut self, name: &str, ts: u64) -> bool {
        let key = irc_to_lower(name);
        if self.channels.contains_key(&key) {
            return false;
        }
        debug!(channel = %name, ts, "channel created");
        self.channels.insert(key, Channel::new(name, ts));
        true
    }

    /// Add `uid` to `name`, creating the channel with `default_ts` if it
    /// does not exist. Returns `true` when the membership is new.
    pub fn join(
        &mut self,
        table: &ModeTable,
        uid: &str,
        name: &str,
        default_ts: u64,
    ) -> LinkResult<bool> {
        self.join_with_status(table, uid, name, default_ts, "")
    }

    /// [`Matrix::join`] with initial status letters.
    pub fn join_with_status(
        &mut self,
        table: &ModeTable,
        uid: &str,
        name: &str,
        default_ts: u64,
        status: &str,
    ) -> LinkResult<bool> {
        let key = irc_to_lower(name);
        let client = self.clients.get_mut(uid).ok_or_else(|| unknown("client", uid))?;
        client.channels.insert(key.clone());
        let channel = self
            .channels
            .entry(key)
            .or_insert_with(|| Channel::new(name, default_ts));
        Ok(channel.add_member(table, uid, status))
    }

    /// Remove `uid` from `name`. An absent member is logged and reported as
    /// `false`. The channel is dropped once empty unless it is `+P`.
    pub fn part(&mut self, uid: &str, name: &str) -> LinkResult<bool> {
        let key = irc_to_lower(name);
        let channel = self
            .channels
            .get_mut(&key)
            .ok_or_else(|| unknown("channel", name))?;

        let present = channel.remove_member(uid);
        if !present {
            warn!(channel = %channel.name, %uid, "part for non-member");
        }
        if channel.is_empty() && !channel.is_permanent() {
            debug!(channel = %channel.name, "channel emptied");
            self.channels.remove(&key);
        }
        if let Some(client) = self.clients.get_mut(uid) {
            client.channels.remove(&key);
        }
        Ok(present)
    }

    /// Drop an empty, non-permanent channel. Used after `-P`.
    pub fn collect_channel(&mut self, name: &str) {
        let key = irc_to_lower(name);
        if self
            .channels
            .get(&key)
            .is_some_and(|c| c.is_empty() && !c.is_permanent())
        {
            self.channels.remove(&key);
        }
    }

    // ------------------------------------------------------------------
    // Klines
    // ------------------------------------------------------------------

    pub fn add_kline(&mut self, kline: Kline) {
        self.klines
            .insert((kline.user.clone(), kline.host.clone()), kline);
    }

    pub fn remove_kline(&mut self, user: &str, host: &str) -> Option<Kline> {
        self.klines.remove(&(user.to_string(), host.to_string()))
    }

    pub fn klines(&self) -> impl Iterator<Item = &Kline> {
        self.klines.values()
    }
}
