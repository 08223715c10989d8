//! Verb handlers.
//!
//! Each handler turns one wire verb into registry mutations and fan-out.
//! Handlers validate everything before mutating, so a recoverable error
//! leaves state untouched.

pub mod channel;
pub mod client;
pub mod core;
pub mod kline;
pub mod link;
pub mod messaging;

pub use self::core::{Context, Handler, HandlerResult, Outbox, Registry, unix_now};

use ts6_proto::Line;

use crate::error::{LinkError, LinkResult};
use crate::state::Source;

/// Parameter `n`, or `NeedMoreParams`.
pub(crate) fn require<'a>(line: &'a Line, n: usize, verb: &'static str) -> LinkResult<&'a str> {
    line.arg(n).ok_or(LinkError::NeedMoreParams(verb))
}

/// Parse a timestamp or hop count.
pub(crate) fn parse_num(value: &str, verb: &'static str) -> LinkResult<u64> {
    value
        .parse()
        .map_err(|_| LinkError::malformed(verb, format!("'{}' is not a number", value)))
}

/// The source, which must be a client.
pub(crate) fn client_source<'a>(source: Option<&'a Source>, verb: &'static str) -> LinkResult<&'a str> {
    match source {
        Some(Source::Client(uid)) => Ok(uid),
        _ => Err(LinkError::malformed(verb, "source must be a client")),
    }
}

/// The source, which must be a server.
pub(crate) fn server_source<'a>(source: Option<&'a Source>, verb: &'static str) -> LinkResult<&'a str> {
    match source {
        Some(Source::Server(sid)) => Ok(sid),
        _ => Err(LinkError::malformed(verb, "source must be a server")),
    }
}

/// The source's SID or UID, or the hub's SID when the line had none.
pub(crate) fn source_id(ctx: &Context, source: Option<&Source>) -> String {
    match source {
        Some(source) => source.id().to_string(),
        None => ctx.handshake.hub_sid().unwrap_or_default().to_string(),
    }
}
