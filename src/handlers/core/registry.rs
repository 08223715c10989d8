//! Command handler registry and dispatch.
//!
//! The `Registry` maps each wire verb to its handler and keeps per-verb
//! usage counters.

use std::collections::HashMap;

use ts6_proto::Line;

use super::context::{Context, Handler, HandlerResult};
use crate::error::LinkError;
use crate::handlers::{
    channel::{
        BmaskHandler, JoinHandler, KickHandler, ModeHandler, PartHandler, SjoinHandler, TbHandler,
        TmodeHandler, TopicHandler,
    },
    client::{
        AwayHandler, ChghostHandler, EuidHandler, IdentifiedHandler, KillHandler, LoginHandler,
        NickHandler, QuitHandler, RealhostHandler, SuHandler, UidHandler,
    },
    kline::{KlineHandler, UnklineHandler},
    link::{
        CapabHandler, ErrorHandler, GcapHandler, PassHandler, PingHandler, PongHandler,
        ServerHandler, SidHandler, SquitHandler, SvinfoHandler,
    },
    messaging::{MessageHandler, MessageKind},
};
use crate::telemetry::spans;

/// Registry of verb handlers.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
    /// Dispatch counters per verb.
    command_counts: HashMap<&'static str, u64>,
}

impl Registry {
    /// Create a registry with every handler registered.
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        // Link management
        handlers.insert("PASS", Box::new(PassHandler));
        handlers.insert("CAPAB", Box::new(CapabHandler));
        handlers.insert("SERVER", Box::new(ServerHandler));
        handlers.insert("SID", Box::new(SidHandler));
        handlers.insert("SVINFO", Box::new(SvinfoHandler));
        handlers.insert("PING", Box::new(PingHandler));
        handlers.insert("PONG", Box::new(PongHandler));
        handlers.insert("GCAP", Box::new(GcapHandler));
        handlers.insert("SQUIT", Box::new(SquitHandler));
        handlers.insert("ERROR", Box::new(ErrorHandler));

        // Client introduction and identity
        handlers.insert("EUID", Box::new(EuidHandler));
        handlers.insert("UID", Box::new(UidHandler));
        handlers.insert("NICK", Box::new(NickHandler));
        handlers.insert("QUIT", Box::new(QuitHandler));
        handlers.insert("KILL", Box::new(KillHandler));
        handlers.insert("CHGHOST", Box::new(ChghostHandler));
        handlers.insert("AWAY", Box::new(AwayHandler));
        handlers.insert("SU", Box::new(SuHandler));
        handlers.insert("IDENTIFIED", Box::new(IdentifiedHandler));
        handlers.insert("LOGIN", Box::new(LoginHandler));
        handlers.insert("REALHOST", Box::new(RealhostHandler));

        // Channel state
        handlers.insert("SJOIN", Box::new(SjoinHandler));
        handlers.insert("JOIN", Box::new(JoinHandler));
        handlers.insert("PART", Box::new(PartHandler));
        handlers.insert("KICK", Box::new(KickHandler::kick()));
        handlers.insert("REMOVE", Box::new(KickHandler::remove()));
        handlers.insert("TOPIC", Box::new(TopicHandler));
        handlers.insert("TB", Box::new(TbHandler));
        handlers.insert("TMODE", Box::new(TmodeHandler));
        handlers.insert("MODE", Box::new(ModeHandler));
        handlers.insert("BMASK", Box::new(BmaskHandler));

        // Messaging
        handlers.insert("PRIVMSG", Box::new(MessageHandler(MessageKind::Privmsg)));
        handlers.insert("NOTICE", Box::new(MessageHandler(MessageKind::Notice)));

        // Bans
        handlers.insert("KLINE", Box::new(KlineHandler));
        handlers.insert("UNKLINE", Box::new(UnklineHandler));

        Self {
            handlers,
            command_counts: HashMap::new(),
        }
    }

    /// Whether a handler exists for `verb` (already uppercased).
    pub fn handles(&self, verb: &str) -> bool {
        self.handlers.contains_key(verb)
    }

    /// Verb usage, most used first.
    pub fn get_command_stats(&self) -> Vec<(&'static str, u64)> {
        let mut stats: Vec<_> = self
            .command_counts
            .iter()
            .map(|(cmd, count)| (*cmd, *count))
            .collect();
        stats.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        stats
    }

    /// Dispatch a line to its handler.
    ///
    /// `ENCAP` is unwrapped and its inner verb dispatched with the original
    /// source. The source prefix is resolved before the handler runs, so an
    /// unknown source drops the line untouched.
    pub fn dispatch(&mut self, ctx: &mut Context, line: &Line) -> HandlerResult {
        if line.verb == "ENCAP" {
            let inner = line.unwrap_encap().ok_or(LinkError::NeedMoreParams("ENCAP"))?;
            return self.dispatch(ctx, &inner);
        }

        let Some((&name, handler)) = self.handlers.get_key_value(line.verb.as_str()) else {
            return Err(LinkError::UnrecognizedVerb(line.verb.clone()));
        };
        *self.command_counts.entry(name).or_insert(0) += 1;

        let source = match line.source.as_deref() {
            Some(token) => Some(ctx.matrix.resolve_source(token)?),
            None => None,
        };

        let span = spans::command(name, line.source.as_deref());
        let _enter = span.enter();
        handler.handle(ctx, source.as_ref(), line)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
