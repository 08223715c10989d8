//! Operations issued by service logic for locally-owned clients.
//!
//! Each operation mutates the registry, writes one wire line addressed by
//! UID/SID, and delivers the event in-process to every other
//! locally-owned member in membership order. Local clients never reach
//! each other through the wire.

use tracing::info;
use ts6_proto::{ModeChange, parse_modes};

use super::Session;
use crate::error::{LinkError, LinkResult};
use crate::events::{ClientEvent, ClientListener};
use crate::state::{Client, Destination, Topic, is_channel_name};
use crate::sync::burst::{introduce_line, login_line};
use crate::telemetry::spans;

/// A client for [`Session::introduce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub nick: String,
    pub user: String,
    pub host: String,
    pub gecos: String,
    /// User modes, e.g. `+io`.
    pub modes: String,
    pub account: Option<String>,
}

impl NewClient {
    pub fn new(
        nick: impl Into<String>,
        user: impl Into<String>,
        host: impl Into<String>,
        gecos: impl Into<String>,
    ) -> Self {
        Self {
            nick: nick.into(),
            user: user.into(),
            host: host.into(),
            gecos: gecos.into(),
            modes: "+io".to_string(),
            account: None,
        }
    }
}

impl From<&crate::config::ClientBlock> for NewClient {
    fn from(block: &crate::config::ClientBlock) -> Self {
        Self {
            nick: block.nick.clone(),
            user: block.user.clone(),
            host: block.host.clone(),
            gecos: block.gecos.clone(),
            modes: block.modes.clone(),
            account: block.account.clone(),
        }
    }
}

impl Session {
    /// Fail unless `uid` is a locally-owned client.
    fn require_local(&self, uid: &str) -> LinkResult<&Client> {
        let client = self.ctx.matrix.client(uid)?;
        if !client.local {
            return Err(LinkError::UnknownEntity(format!("local client {}", uid)));
        }
        Ok(client)
    }

    /// Whether the hub speaks `EUID`. Assumed until it says otherwise.
    fn hub_has_euid(&self) -> bool {
        match self.ctx.handshake.hub_sid() {
            Some(sid) => self
                .ctx
                .matrix
                .server(sid)
                .map_or(true, |hub| hub.has_cap("EUID")),
            None => true,
        }
    }

    /// Introduce a locally-owned client and attach its listener. Returns
    /// the allocated UID.
    pub fn introduce(&mut self, new: NewClient, listener: Box<dyn ClientListener>) -> LinkResult<String> {
        if self.ctx.matrix.client_by_nick(&new.nick).is_ok() {
            return Err(LinkError::malformed("EUID", format!("nick {} is in use", new.nick)));
        }
        let modes = parse_modes(&self.ctx.umodes, &new.modes, &[] as &[&str])?;

        let mut uid = self.ctx.uids.next_uid();
        while self.ctx.matrix.client(&uid).is_ok() {
            uid = self.ctx.uids.next_uid();
        }
        let span = spans::local_op("introduce", &uid);
        let _enter = span.enter();

        let mut client = Client::new(
            uid.clone(),
            new.nick,
            new.user,
            new.host,
            new.gecos,
            self.ctx.now(),
            self.ctx.local_sid(),
        );
        client.local = true;
        client.login = new.account;
        client.apply_modes(&modes);

        let euid = self.hub_has_euid();
        let mut lines = vec![introduce_line(self.ctx.local_sid(), &client, euid)];
        if !euid {
            if let Some(account) = &client.login {
                lines.push(login_line(self.ctx.local_sid(), &uid, Some(account)));
            }
        }

        info!(%uid, nick = %client.nick, "introducing local client");
        self.ctx.matrix.add_client(client)?;
        self.ctx.listeners.attach(uid.clone(), listener);
        for line in lines {
            self.ctx.send(line);
        }
        Ok(uid)
    }

    /// Join a channel. A new channel is created with the current time as
    /// its TS and the joiner opped.
    pub fn join(&mut self, uid: &str, channel: &str) -> LinkResult {
        self.require_local(uid)?;
        if !is_channel_name(channel) {
            return Err(LinkError::malformed("JOIN", format!("{} is not a channel", channel)));
        }
        let span = spans::local_op("join", uid);
        let _enter = span.enter();

        let now = self.ctx.now();
        let created = self.ctx.matrix.ensure_channel(channel, now);
        let status = if created { "o" } else { "" };
        let ctx = &mut self.ctx;
        if !ctx.matrix.join_with_status(&ctx.table, uid, channel, now, status)? {
            return Ok(());
        }

        let chan = self.ctx.matrix.channel(channel)?;
        let (name, ts) = (chan.name.clone(), chan.ts);
        let line = if created {
            format!(":{} SJOIN {} {} + :@{}", self.ctx.local_sid(), ts, name, uid)
        } else {
            format!(":{} JOIN {} {} +", uid, ts, name)
        };
        self.ctx.send(line);

        self.ctx.notify(uid, &ClientEvent::Joined { channel: name.clone() });
        let event = ClientEvent::UserJoined {
            channel: name.clone(),
            uid: uid.to_string(),
        };
        self.ctx.notify_channel(&name, Some(uid), &event);
        Ok(())
    }

    /// Leave a channel.
    pub fn part(&mut self, uid: &str, channel: &str, reason: Option<&str>) -> LinkResult {
        self.require_local(uid)?;
        let span = spans::local_op("part", uid);
        let _enter = span.enter();

        let name = self.ctx.matrix.channel(channel)?.name.clone();
        if !self.ctx.matrix.part(uid, &name)? {
            return Ok(());
        }
        self.ctx.send(match reason {
            Some(reason) => format!(":{} PART {} :{}", uid, name, reason),
            None => format!(":{} PART {}", uid, name),
        });

        let reason = reason.map(str::to_string);
        self.ctx.notify(
            uid,
            &ClientEvent::Left {
                channel: name.clone(),
                reason: reason.clone(),
            },
        );
        let event = ClientEvent::UserLeft {
            channel: name.clone(),
            uid: uid.to_string(),
            reason,
        };
        self.ctx.notify_channel(&name, None, &event);
        Ok(())
    }

    pub fn privmsg(&mut self, uid: &str, target: &str, text: &str) -> LinkResult {
        self.message(uid, target, text, false)
    }

    pub fn notice(&mut self, uid: &str, target: &str, text: &str) -> LinkResult {
        self.message(uid, target, text, true)
    }

    /// Channel messages go out once on the wire and once to each other
    /// local member. A message to a local client stays in-process.
    fn message(&mut self, uid: &str, target: &str, text: &str, notice: bool) -> LinkResult {
        self.require_local(uid)?;
        let span = spans::local_op(if notice { "notice" } else { "privmsg" }, uid);
        let _enter = span.enter();

        let verb = if notice { "NOTICE" } else { "PRIVMSG" };
        let event = |from: &str, target: String| {
            let (from, text) = (from.to_string(), text.to_string());
            if notice {
                ClientEvent::Notice { from, target, text }
            } else {
                ClientEvent::Privmsg { from, target, text }
            }
        };

        match self.ctx.matrix.resolve_destination(target)? {
            Destination::Channel(key) => {
                let name = self.ctx.matrix.channel(&key)?.name.clone();
                self.ctx.send(format!(":{} {} {} :{}", uid, verb, name, text));
                let event = event(uid, name);
                self.ctx.notify_channel(&key, Some(uid), &event);
            }
            Destination::Client(dest) => {
                let dest_client = self.ctx.matrix.client(&dest)?;
                if dest_client.local {
                    let event = event(uid, dest_client.nick.clone());
                    self.ctx.notify(&dest, &event);
                } else {
                    self.ctx.send(format!(":{} {} {} :{}", uid, verb, dest, text));
                }
            }
        }
        Ok(())
    }

    /// Set (or with empty `text`, clear) a channel topic.
    pub fn topic(&mut self, uid: &str, channel: &str, text: &str) -> LinkResult {
        let setter = self.require_local(uid)?.mask();
        let span = spans::local_op("topic", uid);
        let _enter = span.enter();

        let now = self.ctx.now();
        let chan = self.ctx.matrix.channel_mut(channel)?;
        chan.topic = (!text.is_empty()).then(|| Topic {
            text: text.to_string(),
            setter: setter.clone(),
            ts: now,
        });
        let name = chan.name.clone();

        self.ctx.send(format!(":{} TOPIC {} :{}", uid, name, text));
        let event = ClientEvent::TopicUpdated {
            channel: name.clone(),
            setter,
            text: text.to_string(),
        };
        self.ctx.notify_channel(&name, Some(uid), &event);
        Ok(())
    }

    /// Change channel modes; sent as `TMODE` at the channel's TS.
    pub fn mode<S: AsRef<str>>(&mut self, uid: &str, channel: &str, modes: &str, args: &[S]) -> LinkResult<ModeChange> {
        let setter = self.require_local(uid)?.nick.clone();
        let span = spans::local_op("mode", uid);
        let _enter = span.enter();

        let change = parse_modes(&self.ctx.table, modes, args)?;
        let ctx = &mut self.ctx;
        let chan = ctx.matrix.channel_mut(channel)?;
        chan.apply_modes(&ctx.table, &change);
        let (name, ts) = (chan.name.clone(), chan.ts);
        self.ctx.matrix.collect_channel(&name);

        self.ctx
            .send(format!(":{} TMODE {} {} {}", uid, ts, name, change.render()));
        let event = ClientEvent::ModeChanged {
            channel: name.clone(),
            setter,
            change: change.clone(),
        };
        self.ctx.notify_channel(&name, Some(uid), &event);
        Ok(change)
    }

    /// Kick `target` (UID or nick) from a channel.
    pub fn kick(&mut self, uid: &str, channel: &str, target: &str, reason: &str) -> LinkResult {
        let by = self.require_local(uid)?.nick.clone();
        let span = spans::local_op("kick", uid);
        let _enter = span.enter();

        let name = self.ctx.matrix.channel(channel)?.name.clone();
        let victim = self.ctx.matrix.find_client(target)?.uid.clone();
        if !self.ctx.matrix.channel(&name)?.is_member(&victim) {
            return Err(LinkError::UnknownEntity(format!("member {} of {}", victim, name)));
        }

        self.ctx
            .send(format!(":{} KICK {} {} :{}", uid, name, victim, reason));
        self.ctx.notify(
            &victim,
            &ClientEvent::Kicked {
                channel: name.clone(),
                by: by.clone(),
                reason: reason.to_string(),
            },
        );
        self.ctx.matrix.part(&victim, &name)?;
        let event = ClientEvent::UserKicked {
            channel: name.clone(),
            uid: victim,
            by,
            reason: reason.to_string(),
        };
        self.ctx.notify_channel(&name, Some(uid), &event);
        Ok(())
    }

    /// Change nick; the nick TS becomes now.
    pub fn nick(&mut self, uid: &str, new_nick: &str) -> LinkResult {
        let channels: Vec<String> = self.require_local(uid)?.channels.iter().cloned().collect();
        if let Ok(holder) = self.ctx.matrix.client_by_nick(new_nick) {
            if holder.uid != uid {
                return Err(LinkError::malformed("NICK", format!("nick {} is in use", new_nick)));
            }
        }
        let span = spans::local_op("nick", uid);
        let _enter = span.enter();

        let ts = self.ctx.now();
        let old = self.ctx.matrix.rename_client(uid, new_nick, ts)?;
        self.ctx.send(format!(":{} NICK {} :{}", uid, new_nick, ts));
        let event = ClientEvent::NickChanged {
            uid: uid.to_string(),
            old,
            new: new_nick.to_string(),
        };
        self.ctx.notify_common(uid, &channels, &event);
        Ok(())
    }

    /// Remove a local client from the network.
    pub fn quit(&mut self, uid: &str, reason: &str) -> LinkResult {
        self.require_local(uid)?;
        let span = spans::local_op("quit", uid);
        let _enter = span.enter();

        let (client, channels) = self.ctx.matrix.quit_client(uid)?;
        self.ctx.send(format!(":{} QUIT :{}", uid, reason));
        let event = ClientEvent::UserQuit {
            uid: client.uid.clone(),
            nick: client.nick,
            reason: reason.to_string(),
        };
        self.ctx.notify_common(uid, &channels, &event);
        self.ctx.listeners.detach(uid);
        Ok(())
    }

    /// Log any client in (`Some`) or out (`None`), announced with `SU`.
    pub fn login(&mut self, uid: &str, account: Option<&str>) -> LinkResult {
        let span = spans::local_op("login", uid);
        let _enter = span.enter();

        let client = self.ctx.matrix.client_mut(uid)?;
        client.login = account.map(str::to_string);
        let line = login_line(self.ctx.local_sid(), uid, account);
        self.ctx.send(line);
        Ok(())
    }

    /// Mark a local client away (`Some`) or back (`None`).
    pub fn away(&mut self, uid: &str, reason: Option<&str>) -> LinkResult {
        self.require_local(uid)?;
        self.ctx.matrix.client_mut(uid)?.away = reason.map(str::to_string);
        self.ctx.send(match reason {
            Some(reason) => format!(":{} AWAY :{}", uid, reason),
            None => format!(":{} AWAY", uid),
        });
        Ok(())
    }

    /// Change the visible host of any client.
    pub fn chghost(&mut self, uid: &str, host: &str) -> LinkResult {
        let span = spans::local_op("chghost", uid);
        let _enter = span.enter();

        self.ctx.matrix.client_mut(uid)?.visible_host = host.to_string();
        let line = format!(":{} CHGHOST {} {}", self.ctx.local_sid(), uid, host);
        self.ctx.send(line);
        Ok(())
    }
}
