//! Link management: handshake, server introductions, keep-alive, splits.

use tracing::{debug, error, info, warn};
use ts6_proto::Line;

use super::{Context, Handler, HandlerResult, parse_num, require, server_source, source_id};
use crate::error::LinkError;
use crate::state::{Server, Source};
use crate::sync::burst::{BurstOptions, generate_burst};
use crate::sync::handshake::{SessionState, svinfo};
use crate::sync::split::handle_netsplit;

/// `PASS <password> TS 6 :<sid>`
pub struct PassHandler;

impl Handler for PassHandler {
    fn handle(&self, ctx: &mut Context, _source: Option<&Source>, line: &Line) -> HandlerResult {
        if ctx.state() != SessionState::Registering {
            return Err(LinkError::malformed("PASS", "already registered"));
        }
        ctx.handshake.on_pass(&line.params, &ctx.link)
    }
}

/// `CAPAB :<tokens>`
pub struct CapabHandler;

impl Handler for CapabHandler {
    fn handle(&self, ctx: &mut Context, _source: Option<&Source>, line: &Line) -> HandlerResult {
        let tokens = require(line, 0, "CAPAB")?;
        ctx.handshake.on_capab(tokens);
        Ok(())
    }
}

/// `SERVER <name> <hops> :<description>`
///
/// Only the hub introduces itself this way; it ends registration and starts
/// the burst exchange.
pub struct ServerHandler;

impl Handler for ServerHandler {
    fn handle(&self, ctx: &mut Context, _source: Option<&Source>, line: &Line) -> HandlerResult {
        let name = require(line, 0, "SERVER")?;
        let description = line.arg(2).unwrap_or_default();
        if ctx.state() != SessionState::Registering {
            return Err(LinkError::malformed("SERVER", "servers behind the hub must use SID"));
        }

        let hub = ctx.handshake.on_server(name, description, &ctx.link)?;
        let euid = hub.has_cap("EUID");
        ctx.matrix.add_server(hub)?;
        ctx.handshake.transition(SessionState::Bursting)?;
        ctx.hooks.burst_started();

        let now = ctx.now();
        ctx.send(svinfo(now));
        let burst = generate_burst(
            &ctx.matrix,
            &ctx.table,
            BurstOptions {
                local_sid: &ctx.handshake.local_sid,
                euid,
                chunk: ctx.limits.burst_chunk,
            },
        );
        info!(lines = burst.len(), euid, "sending burst");
        for line in burst {
            ctx.send(line);
        }
        Ok(())
    }
}

/// `:<upsid> SID <name> <hops> <sid> :<description>`
pub struct SidHandler;

impl Handler for SidHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let uplink = server_source(source, "SID")?;
        let name = require(line, 0, "SID")?;
        let hops = parse_num(require(line, 1, "SID")?, "SID")?;
        let sid = require(line, 2, "SID")?;
        let description = line.arg(3).unwrap_or_default();

        let hops = u32::try_from(hops).map_err(|_| LinkError::malformed("SID", "hop count"))?;
        debug!(%sid, %name, %uplink, hops, "server introduced");
        ctx.matrix.add_server(Server::new(
            sid,
            name,
            description,
            hops,
            Some(uplink.to_string()),
        ))
    }
}

/// `SVINFO <max> <min> 0 :<time>`
pub struct SvinfoHandler;

impl Handler for SvinfoHandler {
    fn handle(&self, ctx: &mut Context, _source: Option<&Source>, line: &Line) -> HandlerResult {
        let max = parse_num(require(line, 0, "SVINFO")?, "SVINFO")?;
        if max < 6 {
            return Err(LinkError::AuthFailed(format!("hub TS version {} is below 6", max)));
        }
        if let Some(theirs) = line.arg(3).and_then(|t| t.parse::<i64>().ok()) {
            let skew = theirs - ctx.now() as i64;
            if skew.abs() > 60 {
                warn!(skew, "clock skew with hub");
            }
        }
        Ok(())
    }
}

/// `PING :<token>` or `:<src> PING <arg> :<dest>`
///
/// The first PING after the hub's introduction ends its burst.
pub struct PingHandler;

impl Handler for PingHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let reply_to = match source {
            Some(source) => source.id().to_string(),
            None => require(line, 0, "PING")?.to_string(),
        };
        let pong = format!(":{} PONG {} :{}", ctx.local_sid(), ctx.local_name(), reply_to);
        ctx.send_raw(pong);

        if ctx.state() == SessionState::Bursting {
            ctx.handshake.transition(SessionState::Synchronized)?;
            info!(
                servers = ctx.matrix.servers().count(),
                clients = ctx.matrix.clients().count(),
                channels = ctx.matrix.channels().count(),
                "burst complete"
            );
            ctx.hooks.burst_ended();
        }
        Ok(())
    }
}

/// `PONG`
pub struct PongHandler;

impl Handler for PongHandler {
    fn handle(&self, _ctx: &mut Context, source: Option<&Source>, _line: &Line) -> HandlerResult {
        debug!(from = source.map(Source::id), "pong");
        Ok(())
    }
}

/// `:<sid> GCAP :<caps>`
pub struct GcapHandler;

impl Handler for GcapHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let sid = server_source(source, "GCAP")?;
        let caps = require(line, 0, "GCAP")?;
        ctx.matrix.server_mut(sid)?.set_capabilities(caps);
        Ok(())
    }
}

/// `SQUIT <sid|name> :<reason>`
pub struct SquitHandler;

impl Handler for SquitHandler {
    fn handle(&self, ctx: &mut Context, _source: Option<&Source>, line: &Line) -> HandlerResult {
        let target = require(line, 0, "SQUIT")?;
        let reason = line.arg(1).unwrap_or_default();
        if target == ctx.local_sid() || ts6_proto::irc_eq(target, ctx.local_name()) {
            return Err(LinkError::RemoteError(format!("delinked by hub: {}", reason)));
        }
        let sid = ctx.matrix.find_server(target)?.sid.clone();
        handle_netsplit(ctx, &sid, reason)?;
        Ok(())
    }
}

/// `ERROR :<message>`
pub struct ErrorHandler;

impl Handler for ErrorHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let message = line.last().unwrap_or_default();
        error!(from = %source_id(ctx, source), %message, "hub sent ERROR");
        Err(LinkError::RemoteError(message.to_string()))
    }
}
