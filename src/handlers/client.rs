//! Client introduction, identity and departure.

use tracing::{debug, info};
use ts6_proto::{Line, irc_eq, parse_modes};

use super::{Context, Handler, HandlerResult, client_source, parse_num, require, server_source};
use crate::error::LinkError;
use crate::events::ClientEvent;
use crate::state::{Client, Source};

/// Insert an introduced client and tell service logic about it.
fn introduce(ctx: &mut Context, client: Client) -> HandlerResult {
    debug!(uid = %client.uid, nick = %client.nick, server = %client.server, "client introduced");
    let has_login = client.login.is_some();
    let uid = client.uid.clone();
    ctx.matrix.add_client(client)?;
    let client = ctx.matrix.client(&uid)?;
    ctx.hooks.client_introduced(client);
    if has_login {
        ctx.hooks.login_changed(client);
    }
    Ok(())
}

/// Build a client from the fields EUID and UID share.
#[allow(clippy::too_many_arguments)]
fn parse_intro(
    ctx: &Context,
    verb: &'static str,
    server: &str,
    nick: &str,
    ts: &str,
    modes: &str,
    user: &str,
    host: &str,
    ip: &str,
    uid: &str,
    gecos: &str,
) -> Result<Client, LinkError> {
    let ts = parse_num(ts, verb)?;
    let no_args: &[&str] = &[];
    let modes = parse_modes(&ctx.umodes, modes, no_args)?;
    let mut client = Client::new(uid, nick, user, host, gecos, ts, server);
    client.ip = ip.to_string();
    client.apply_modes(&modes);
    Ok(client)
}

/// `:<sid> EUID <nick> <hops> <ts> <umodes> <user> <host> <ip> <uid> <realhost> <account> :<gecos>`
pub struct EuidHandler;

impl Handler for EuidHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let sid = server_source(source, "EUID")?;
        if line.params.len() < 11 {
            return Err(LinkError::NeedMoreParams("EUID"));
        }
        let p = &line.params;
        let mut client = parse_intro(
            ctx, "EUID", sid, &p[0], &p[2], &p[3], &p[4], &p[5], &p[6], &p[7], &p[10],
        )?;
        if p[8] != "*" {
            client.host = p[8].clone();
        }
        if p[9] != "*" {
            client.login = Some(p[9].clone());
        }
        introduce(ctx, client)
    }
}

/// `:<sid> UID <nick> <hops> <ts> <umodes> <user> <host> <ip> <uid> :<gecos>`
pub struct UidHandler;

impl Handler for UidHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let sid = server_source(source, "UID")?;
        if line.params.len() < 9 {
            return Err(LinkError::NeedMoreParams("UID"));
        }
        let p = &line.params;
        let client = parse_intro(
            ctx, "UID", sid, &p[0], &p[2], &p[3], &p[4], &p[5], &p[6], &p[7], &p[8],
        )?;
        introduce(ctx, client)
    }
}

/// `:<uid> NICK <newnick> :<ts>`
pub struct NickHandler;

impl Handler for NickHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let uid = client_source(source, "NICK")?.to_string();
        let new = require(line, 0, "NICK")?;
        let ts = match line.arg(1) {
            Some(ts) => parse_num(ts, "NICK")?,
            None => ctx.now(),
        };
        let channels: Vec<String> = ctx.matrix.client(&uid)?.channels.iter().cloned().collect();
        let old = ctx.matrix.rename_client(&uid, new, ts)?;

        let event = ClientEvent::NickChanged {
            uid: uid.clone(),
            old,
            new: new.to_string(),
        };
        ctx.notify_common(&uid, &channels, &event);
        ctx.notify(&uid, &event);
        Ok(())
    }
}

/// Remove a client and tell local observers. Local victims hear `Quit`
/// themselves and lose their listener.
fn remove_client(ctx: &mut Context, uid: &str, reason: &str) -> HandlerResult {
    let (client, channels) = ctx.matrix.quit_client(uid)?;
    let event = ClientEvent::UserQuit {
        uid: client.uid.clone(),
        nick: client.nick.clone(),
        reason: reason.to_string(),
    };
    ctx.notify_common(uid, &channels, &event);
    if client.local {
        info!(%uid, nick = %client.nick, %reason, "local client removed by the network");
        ctx.notify(
            uid,
            &ClientEvent::Quit {
                reason: reason.to_string(),
            },
        );
        ctx.listeners.detach(uid);
    }
    Ok(())
}

/// `:<uid> QUIT :<reason>`
pub struct QuitHandler;

impl Handler for QuitHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let uid = client_source(source, "QUIT")?.to_string();
        let reason = line.arg(0).unwrap_or_default();
        remove_client(ctx, &uid, reason)
    }
}

/// `:<src> KILL <uid> :<reason>`
pub struct KillHandler;

impl Handler for KillHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let target = require(line, 0, "KILL")?;
        let uid = ctx.matrix.find_client(target)?.uid.clone();
        let killer = source
            .map(|s| ctx.display_name(s.id()))
            .unwrap_or_else(|| "*".to_string());
        let reason = format!("Killed ({} ({}))", killer, line.arg(1).unwrap_or_default());
        remove_client(ctx, &uid, &reason)
    }
}

/// `:<src> CHGHOST <uid> <newhost>`
pub struct ChghostHandler;

impl Handler for ChghostHandler {
    fn handle(&self, ctx: &mut Context, _source: Option<&Source>, line: &Line) -> HandlerResult {
        let uid = ctx.matrix.find_client(require(line, 0, "CHGHOST")?)?.uid.clone();
        let host = require(line, 1, "CHGHOST")?;
        ctx.matrix.client_mut(&uid)?.visible_host = host.to_string();
        Ok(())
    }
}

/// `:<uid> AWAY [:<reason>]`
pub struct AwayHandler;

impl Handler for AwayHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let uid = client_source(source, "AWAY")?;
        let away = line.arg(0).filter(|r| !r.is_empty()).map(str::to_string);
        ctx.matrix.client_mut(uid)?.away = away;
        Ok(())
    }
}

fn set_login(ctx: &mut Context, uid: &str, account: Option<String>) -> HandlerResult {
    let client = ctx.matrix.client_mut(uid)?;
    if client.login == account {
        return Ok(());
    }
    debug!(%uid, account = account.as_deref(), "login changed");
    client.login = account;
    let client = ctx.matrix.client(uid)?;
    ctx.hooks.login_changed(client);
    Ok(())
}

/// `:<sid> ENCAP * SU <uid> [:<account>]`
pub struct SuHandler;

impl Handler for SuHandler {
    fn handle(&self, ctx: &mut Context, _source: Option<&Source>, line: &Line) -> HandlerResult {
        let uid = ctx.matrix.find_client(require(line, 0, "SU")?)?.uid.clone();
        let account = line.arg(1).filter(|a| !a.is_empty()).map(str::to_string);
        set_login(ctx, &uid, account)
    }
}

/// `:<uid> ENCAP * LOGIN <account>`
pub struct LoginHandler;

impl Handler for LoginHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let uid = client_source(source, "LOGIN")?.to_string();
        let account = require(line, 0, "LOGIN")?.to_string();
        set_login(ctx, &uid, Some(account))
    }
}

/// `:<sid> ENCAP * IDENTIFIED <uid> [<nick>] [:OFF]`
///
/// A nick that no longer matches the client is a stale message and ignored.
pub struct IdentifiedHandler;

impl Handler for IdentifiedHandler {
    fn handle(&self, ctx: &mut Context, _source: Option<&Source>, line: &Line) -> HandlerResult {
        let uid = ctx.matrix.find_client(require(line, 0, "IDENTIFIED")?)?.uid.clone();
        let off = line.params.len() > 1 && line.last() == Some("OFF");
        let nick = line.arg(1).filter(|n| *n != "OFF");

        let client = ctx.matrix.client_mut(&uid)?;
        if let Some(nick) = nick {
            if !irc_eq(nick, &client.nick) {
                debug!(%uid, %nick, current = %client.nick, "stale IDENTIFIED");
                return Ok(());
            }
        }
        client.identified = !off;
        Ok(())
    }
}

/// `:<uid> ENCAP * REALHOST <host>`
pub struct RealhostHandler;

impl Handler for RealhostHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let uid = client_source(source, "REALHOST")?;
        let host = require(line, 0, "REALHOST")?;
        ctx.matrix.client_mut(uid)?.host = host.to_string();
        Ok(())
    }
}
