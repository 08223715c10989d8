//! PRIVMSG and NOTICE.
//!
//! Messages from the wire are only delivered in-process: to local channel
//! members, or to a local client addressed directly. Remote targets are
//! not ours to serve.

use tracing::debug;
use ts6_proto::Line;

use super::{Context, Handler, HandlerResult, require, source_id};
use crate::events::ClientEvent;
use crate::state::{Destination, Source, is_channel_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Privmsg,
    Notice,
}

impl MessageKind {
    fn verb(self) -> &'static str {
        match self {
            MessageKind::Privmsg => "PRIVMSG",
            MessageKind::Notice => "NOTICE",
        }
    }

    fn event(self, from: String, target: String, text: String) -> ClientEvent {
        match self {
            MessageKind::Privmsg => ClientEvent::Privmsg { from, target, text },
            MessageKind::Notice => ClientEvent::Notice { from, target, text },
        }
    }
}

/// `:<src> PRIVMSG|NOTICE <target> :<text>`
pub struct MessageHandler(pub MessageKind);

impl Handler for MessageHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let kind = self.0;
        // The hub sends unprefixed notices while we register.
        if kind == MessageKind::Notice && !ctx.state().is_linked() {
            debug!(text = line.last(), "pre-registration notice");
            return Ok(());
        }

        let target = require(line, 0, kind.verb())?;
        let text = require(line, 1, kind.verb())?.to_string();
        let from = source_id(ctx, source);

        // Server-mask broadcasts ($$mask / $#mask) carry nothing we track.
        if target.starts_with('$') {
            debug!(%target, "mask broadcast ignored");
            return Ok(());
        }
        // Status-prefixed channel targets such as @#ops, and nick@server.
        let stripped = target.trim_start_matches(|c: char| ctx.table.letter_for_symbol(c).is_some());
        let bare = if is_channel_name(stripped) {
            stripped
        } else {
            target.split_once('@').map_or(target, |(nick, _)| nick)
        };

        match ctx.matrix.resolve_destination(bare)? {
            Destination::Channel(key) => {
                let name = ctx.matrix.channel(&key)?.name.clone();
                let event = kind.event(from.clone(), name, text);
                ctx.notify_channel(&key, Some(&from), &event);
            }
            Destination::Client(uid) => {
                if !ctx.matrix.is_local(&uid) {
                    debug!(%uid, "message for remote client ignored");
                    return Ok(());
                }
                let nick = ctx.matrix.client(&uid)?.nick.clone();
                let event = kind.event(from, nick, text);
                ctx.notify(&uid, &event);
            }
        }
        Ok(())
    }
}
