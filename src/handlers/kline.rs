//! KLINE / UNKLINE bookkeeping.
//!
//! Both arrive either directly with a target server mask, or wrapped in
//! `ENCAP` without one; the parameter count tells them apart.

use tracing::info;
use ts6_proto::Line;

use super::{Context, Handler, HandlerResult, parse_num, source_id};
use crate::error::LinkError;
use crate::state::{Kline, Source};

/// `:<src> KLINE <target> <duration> <user> <host> :<reason>` or
/// `:<src> ENCAP * KLINE <duration> <user> <host> :<reason>`
pub struct KlineHandler;

impl Handler for KlineHandler {
    fn handle(&self, ctx: &mut Context, source: Option<&Source>, line: &Line) -> HandlerResult {
        let p = match line.params.len() {
            n if n >= 5 => &line.params[1..],
            4 => &line.params[..],
            _ => return Err(LinkError::NeedMoreParams("KLINE")),
        };
        let kline = Kline {
            duration: parse_num(&p[0], "KLINE")?,
            user: p[1].clone(),
            host: p[2].clone(),
            reason: p[3].clone(),
            setter: ctx.display_name(&source_id(ctx, source)),
        };
        info!(user = %kline.user, host = %kline.host, duration = kline.duration, setter = %kline.setter, "kline added");
        ctx.hooks.kline_added(&kline);
        ctx.matrix.add_kline(kline);
        Ok(())
    }
}

/// `:<src> UNKLINE <target> <user> <host>` or
/// `:<src> ENCAP * UNKLINE <user> <host>`
pub struct UnklineHandler;

impl Handler for UnklineHandler {
    fn handle(&self, ctx: &mut Context, _source: Option<&Source>, line: &Line) -> HandlerResult {
        let p = match line.params.len() {
            n if n >= 3 => &line.params[1..],
            2 => &line.params[..],
            _ => return Err(LinkError::NeedMoreParams("UNKLINE")),
        };
        match ctx.matrix.remove_kline(&p[0], &p[1]) {
            Some(kline) => {
                info!(user = %kline.user, host = %kline.host, "kline removed");
                ctx.hooks.kline_removed(&kline);
            }
            None => info!(user = %p[0], host = %p[1], "unkline for unknown kline"),
        }
        Ok(())
    }
}
