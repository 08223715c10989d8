//! Netsplit handling.
//!
//! When a server leaves the network, everything behind it goes too:
//! - every server it introduced, transitively
//! - every client those servers own, after leaving their channels
//!
//! Locally-owned clients that shared a channel with a departing client get
//! one `UserQuit` each, with the classic `<uplink> <server>` reason.

use tracing::info;

use crate::error::LinkResult;
use crate::events::ClientEvent;
use crate::handlers::Context;

/// Remove `sid` and everything behind it. Returns the number of clients
/// removed.
pub fn handle_netsplit(ctx: &mut Context, sid: &str, reason: &str) -> LinkResult<usize> {
    let server = ctx.matrix.server(sid)?.clone();
    let uplink_name = match &server.uplink {
        Some(up) => ctx.display_name(up),
        None => ctx.local_name().to_string(),
    };
    let quit_reason = netsplit_reason(&uplink_name, &server.name);

    // Each client's channels are captured before removal; notify against
    // the post-removal membership so departing clients are not targets.
    let removed = ctx.matrix.squit(sid)?;
    for (client, channels) in &removed {
        let event = ClientEvent::UserQuit {
            uid: client.uid.clone(),
            nick: client.nick.clone(),
            reason: quit_reason.clone(),
        };
        ctx.notify_common(&client.uid, channels, &event);
    }

    info!(
        sid = %server.sid,
        name = %server.name,
        users_removed = removed.len(),
        %reason,
        "netsplit cleanup complete"
    );
    ctx.hooks.server_split(&server, reason);
    Ok(removed.len())
}

/// Quit reason shown for clients lost in a split.
pub fn netsplit_reason(uplink_name: &str, server_name: &str) -> String {
    format!("{} {}", uplink_name, server_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_netsplit_reason_format() {
        let reason = netsplit_reason("hub.example.net", "leaf.example.net");
        assert_eq!(reason, "hub.example.net leaf.example.net");
    }
}
