//! Channel membership and channel state.

use tracing::debug;
use ts6_proto::{Line, ModeChange, parse_modes};

use super::{Context, Handler, HandlerResult, client_source, parse_num, require, source_id};
use crate::error::LinkError;
use crate::events::ClientEvent;
use crate::state::{Destination, Source, Topic};
use crate::sync::resolve::{apply_bmask, apply_join, apply_sjoin, apply_tmode, apply_topic_burst};

/// Tell local members about a mode change that was applied.
fn announce_modes(ctx: &mut Context, channel: &str, setter: &str, change: ModeChange) {
    if change.is_empty() {
        return;
    }
    let event = ClientEvent::ModeChanged {
        channel: channel.to_string(),
        setter: setter.to_string(),
        change,
    };
    ctx.notify_channel(channel, None, &event);
}

/// `:<sid> SJOIN <ts> <channel> <modes> [args...] :<members>`
pub struct SjoinHandler;

impl Handler for SjoinHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let p = &line.params;
        if p.len() < 4 {
            return Err(LinkError::NeedMoreParams("SJOIN"));
        }
        let ts = parse_num(&p[0], "SJOIN")?;
        let members = &p[p.len() - 1];
        let mode_args = &p[3..p.len() - 1];

        let outcome = apply_sjoin(&mut ctx.matrix, &ctx.table, ts, &p[1], &p[2], mode_args, members)?;
        debug!(
            channel = %outcome.channel,
            ts,
            created = outcome.created,
            ts_changed = outcome.ts_changed,
            joined = outcome.joined.len(),
            "SJOIN applied"
        );

        for uid in &outcome.joined {
            let event = ClientEvent::UserJoined {
                channel: outcome.channel.clone(),
                uid: uid.clone(),
            };
            ctx.notify_channel(&outcome.channel, Some(uid), &event);
        }
        if let Some(change) = outcome.modes {
            let setter = ctx.display_name(&source_id(ctx, source));
            announce_modes(ctx, &outcome.channel, &setter, change);
        }
        Ok(())
    }
}

/// Part `uid` from `channel` and tell the remaining local members.
fn part_and_notify(ctx: &mut Context, uid: &str, channel: &str, reason: Option<&str>) -> HandlerResult {
    let name = ctx.matrix.channel(channel)?.name.clone();
    if ctx.matrix.part(uid, channel)? {
        let event = ClientEvent::UserLeft {
            channel: name.clone(),
            uid: uid.to_string(),
            reason: reason.map(str::to_string),
        };
        ctx.notify_channel(&name, None, &event);
    }
    Ok(())
}

/// `:<uid> JOIN <ts> <channel> +`, or `:<uid> JOIN 0` to leave everything.
pub struct JoinHandler;

impl Handler for JoinHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let uid = client_source(source, "JOIN")?.to_string();
        let first = require(line, 0, "JOIN")?;
        if first == "0" {
            let channels: Vec<String> = ctx.matrix.client(&uid)?.channels.iter().cloned().collect();
            for channel in channels {
                part_and_notify(ctx, &uid, &channel, None)?;
            }
            return Ok(());
        }

        let ts = parse_num(first, "JOIN")?;
        let name = require(line, 1, "JOIN")?;
        let outcome = apply_join(&mut ctx.matrix, &ctx.table, &uid, ts, name)?;
        if outcome.joined {
            let event = ClientEvent::UserJoined {
                channel: outcome.channel.clone(),
                uid: uid.clone(),
            };
            ctx.notify_channel(&outcome.channel, Some(&uid), &event);
        }
        Ok(())
    }
}

/// `:<uid> PART <channel>[,<channel>...] [:<reason>]`
pub struct PartHandler;

impl Handler for PartHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let uid = client_source(source, "PART")?.to_string();
        let targets = require(line, 0, "PART")?;
        let reason = line.arg(1);
        for channel in targets.split(',').filter(|c| !c.is_empty()) {
            part_and_notify(ctx, &uid, channel, reason)?;
        }
        Ok(())
    }
}

/// `:<src> KICK <channel> <uid> :<reason>` and its `REMOVE` twin.
pub struct KickHandler {
    verb: &'static str,
}

impl KickHandler {
    pub fn kick() -> Self {
        Self { verb: "KICK" }
    }

    pub fn remove() -> Self {
        Self { verb: "REMOVE" }
    }
}

impl Handler for KickHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let channel = require(line, 0, self.verb)?;
        let target = require(line, 1, self.verb)?;
        let reason = line.arg(2).unwrap_or_default().to_string();

        let name = ctx.matrix.channel(channel)?.name.clone();
        let uid = ctx.matrix.find_client(target)?.uid.clone();
        let by = ctx.display_name(&source_id(ctx, source));

        if ctx.matrix.part(&uid, &name)? {
            ctx.notify(
                &uid,
                &ClientEvent::Kicked {
                    channel: name.clone(),
                    by: by.clone(),
                    reason: reason.clone(),
                },
            );
            let event = ClientEvent::UserKicked {
                channel: name.clone(),
                uid,
                by,
                reason,
            };
            ctx.notify_channel(&name, None, &event);
        }
        Ok(())
    }
}

/// `:<src> TOPIC <channel> :<topic>`
pub struct TopicHandler;

impl Handler for TopicHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let channel = require(line, 0, "TOPIC")?;
        let text = line.arg(1).unwrap_or_default();
        let setter = match source {
            Some(Source::Client(uid)) => ctx.matrix.client(uid)?.mask(),
            _ => ctx.display_name(&source_id(ctx, source)),
        };
        let now = ctx.now();

        let chan = ctx.matrix.channel_mut(channel)?;
        chan.topic = (!text.is_empty()).then(|| Topic {
            text: text.to_string(),
            setter: setter.clone(),
            ts: now,
        });
        let name = chan.name.clone();
        let event = ClientEvent::TopicUpdated {
            channel: name.clone(),
            setter,
            text: text.to_string(),
        };
        ctx.notify_channel(&name, None, &event);
        Ok(())
    }
}

/// `:<sid> TB <channel> <topicts> [<setter>] :<topic>`
pub struct TbHandler;

impl Handler for TbHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let p = &line.params;
        if p.len() < 3 {
            return Err(LinkError::NeedMoreParams("TB"));
        }
        let topic_ts = parse_num(&p[1], "TB")?;
        let setter = if p.len() >= 4 {
            p[2].clone()
        } else {
            ctx.display_name(&source_id(ctx, source))
        };
        let text = &p[p.len() - 1];

        if apply_topic_burst(&mut ctx.matrix, &p[0], topic_ts, &setter, text)? {
            let name = ctx.matrix.channel(&p[0])?.name.clone();
            let event = ClientEvent::TopicUpdated {
                channel: name.clone(),
                setter,
                text: text.clone(),
            };
            ctx.notify_channel(&name, None, &event);
        }
        Ok(())
    }
}

/// `:<src> TMODE <ts> <channel> <modes> [args...]`
pub struct TmodeHandler;

impl Handler for TmodeHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let p = &line.params;
        if p.len() < 3 {
            return Err(LinkError::NeedMoreParams("TMODE"));
        }
        let ts = parse_num(&p[0], "TMODE")?;
        let name = ctx.matrix.channel(&p[1])?.name.clone();
        if let Some(change) = apply_tmode(&mut ctx.matrix, &ctx.table, ts, &p[1], &p[2], &p[3..])? {
            let setter = ctx.display_name(&source_id(ctx, source));
            announce_modes(ctx, &name, &setter, change);
        }
        Ok(())
    }
}

/// Split MODE parameters into the mode string and its arguments. Both
/// `<modes> <args...>` and a single trailing `:<modes> <args...>` occur.
fn mode_params(params: &[String]) -> (&str, Vec<&str>) {
    match params {
        [modes] if modes.contains(' ') => {
            let mut words = modes.split_whitespace();
            let letters = words.next().unwrap_or_default();
            (letters, words.collect())
        }
        [modes, args @ ..] => (modes.as_str(), args.iter().map(String::as_str).collect()),
        [] => ("", Vec::new()),
    }
}

/// `:<src> MODE <target> :<modes> [args...]`
///
/// In TS6 this carries user modes; a channel target is treated as a TMODE
/// at the channel's own TS.
pub struct ModeHandler;

impl Handler for ModeHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let p = &line.params;
        if p.len() < 2 {
            return Err(LinkError::NeedMoreParams("MODE"));
        }
        let (modes, args) = mode_params(&p[1..]);
        match ctx.matrix.resolve_destination(&p[0])? {
            Destination::Client(uid) => {
                let change = parse_modes(&ctx.umodes, modes, &args)?;
                ctx.matrix.client_mut(&uid)?.apply_modes(&change);
            }
            Destination::Channel(key) => {
                let (ts, name) = {
                    let chan = ctx.matrix.channel(&key)?;
                    (chan.ts, chan.name.clone())
                };
                if let Some(change) = apply_tmode(&mut ctx.matrix, &ctx.table, ts, &key, modes, &args)? {
                    let setter = ctx.display_name(&source_id(ctx, source));
                    announce_modes(ctx, &name, &setter, change);
                }
            }
        }
        Ok(())
    }
}

/// `:<sid> BMASK <ts> <channel> <type> :<masks>`
pub struct BmaskHandler;

impl Handler for BmaskHandler {
    fn handle(&self, ctx: &mut Context, _source: Option<&Source>, line: &Line) -> HandlerResult {
        let ts = parse_num(require(line, 0, "BMASK")?, "BMASK")?;
        let channel = require(line, 1, "BMASK")?;
        let kind = require(line, 2, "BMASK")?;
        let masks = line.arg(3).unwrap_or_default();
        let mut letters = kind.chars();
        let (Some(letter), None) = (letters.next(), letters.next()) else {
            return Err(LinkError::malformed("BMASK", "type must be one letter"));
        };
        let added = apply_bmask(&mut ctx.matrix, &ctx.table, ts, channel, letter, masks)?;
        debug!(%channel, %letter, added = added.len(), "BMASK applied");
        Ok(())
    }
}
