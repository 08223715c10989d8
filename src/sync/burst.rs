//! Burst generation.
//!
//! After the hub introduces itself we send our complete state:
//! - `EUID` (or `UID` if the hub lacks `EUID`) for each locally-owned client
//! - `ENCAP * SU` for logged-in clients and `ENCAP * IDENTIFIED` for
//!   identified ones
//! - `SJOIN` for each channel with local members, chunked, followed by
//!   `BMASK` for list modes and `TB` when a topic is set
//!
//! Only locally-owned clients are ours to burst; everything else belongs to
//! the hub's side of the network.

use ts6_proto::ModeTable;

use crate::state::{Channel, Client, Matrix};

/// Burst parameters.
#[derive(Debug, Clone, Copy)]
pub struct BurstOptions<'a> {
    pub local_sid: &'a str,
    /// Introduce clients with `EUID` rather than `UID`.
    pub euid: bool,
    /// Members per `SJOIN` line.
    pub chunk: usize,
}

/// Introduction line for one client.
pub fn introduce_line(local_sid: &str, client: &Client, euid: bool) -> String {
    if euid {
        format!(
            ":{} EUID {} 1 {} {} {} {} {} {} {} {} :{}",
            local_sid,
            client.nick,
            client.ts,
            client.mode_string(),
            client.user,
            client.visible_host,
            client.ip,
            client.uid,
            if client.host == client.visible_host { "*" } else { client.host.as_str() },
            client.login.as_deref().unwrap_or("*"),
            client.gecos,
        )
    } else {
        format!(
            ":{} UID {} 1 {} {} {} {} {} {} :{}",
            local_sid,
            client.nick,
            client.ts,
            client.mode_string(),
            client.user,
            client.visible_host,
            client.ip,
            client.uid,
            client.gecos,
        )
    }
}

/// `SU` line announcing a login change; `None` logs out.
pub fn login_line(local_sid: &str, uid: &str, account: Option<&str>) -> String {
    match account {
        Some(account) => format!(":{} ENCAP * SU {} :{}", local_sid, uid, account),
        None => format!(":{} ENCAP * SU {}", local_sid, uid),
    }
}

/// SJOIN lines for a channel, `chunk` members per line. Every line carries
/// the channel TS, name and simple modes.
pub fn sjoin_lines(
    local_sid: &str,
    table: &ModeTable,
    channel: &Channel,
    members: &[&str],
    chunk: usize,
) -> Vec<String> {
    let (letters, params) = channel.modes.render();
    let mode_part = if params.is_empty() {
        letters
    } else {
        format!("{} {}", letters, params.join(" "))
    };

    members
        .chunks(chunk.max(1))
        .map(|group| {
            let tokens: Vec<String> = group
                .iter()
                .map(|uid| {
                    let symbols = channel
                        .member(uid)
                        .map(|m| m.symbols(table))
                        .unwrap_or_default();
                    format!("{}{}", symbols, uid)
                })
                .collect();
            format!(
                ":{} SJOIN {} {} {} :{}",
                local_sid,
                channel.ts,
                channel.name,
                mode_part,
                tokens.join(" ")
            )
        })
        .collect()
}

/// Generate our side of the burst.
pub fn generate_burst(matrix: &Matrix, table: &ModeTable, opts: BurstOptions<'_>) -> Vec<String> {
    let mut lines = Vec::new();

    let locals = matrix.local_clients();
    for client in &locals {
        lines.push(introduce_line(opts.local_sid, client, opts.euid));
        // EUID carries the account already.
        if !opts.euid {
            if let Some(account) = &client.login {
                lines.push(login_line(opts.local_sid, &client.uid, Some(account)));
            }
        }
        if client.identified {
            lines.push(format!(
                ":{} ENCAP * IDENTIFIED {} {}",
                opts.local_sid, client.uid, client.nick
            ));
        }
    }

    let mut channels: Vec<&Channel> = matrix.channels().collect();
    channels.sort_by(|a, b| a.name.cmp(&b.name));
    for channel in channels {
        let members: Vec<&str> = channel
            .members()
            .iter()
            .map(|m| m.uid.as_str())
            .filter(|uid| matrix.is_local(uid))
            .collect();
        if members.is_empty() {
            continue;
        }
        lines.extend(sjoin_lines(opts.local_sid, table, channel, &members, opts.chunk));

        for letter in channel.modes.list_letters() {
            let masks: Vec<&str> = channel.modes.list(letter).collect();
            lines.push(format!(
                ":{} BMASK {} {} {} :{}",
                opts.local_sid,
                channel.ts,
                channel.name,
                letter,
                masks.join(" ")
            ));
        }

        if let Some(topic) = &channel.topic {
            lines.push(format!(
                ":{} TB {} {} {} :{}",
                opts.local_sid, channel.name, topic.ts, topic.setter, topic.text
            ));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Server;

    fn local(uid: &str, nick: &str) -> Client {
        let mut c = Client::new(uid, nick, nick, "services.int", "Service", 1000, "42X");
        c.local = true;
        c.modes.extend(['i', 'o']);
        c
    }

    fn opts(euid: bool) -> BurstOptions<'static> {
        BurstOptions {
            local_sid: "42X",
            euid,
            chunk: 15,
        }
    }

    #[test]
    fn euid_and_uid_formats() {
        let mut c = local("42XAAAAAA", "NickServ");
        c.login = Some("services".into());
        assert_eq!(
            introduce_line("42X", &c, true),
            ":42X EUID NickServ 1 1000 +io NickServ services.int 0 42XAAAAAA * services :Service"
        );
        assert_eq!(
            introduce_line("42X", &c, false),
            ":42X UID NickServ 1 1000 +io NickServ services.int 0 42XAAAAAA :Service"
        );

        c.visible_host = "cloak.int".into();
        assert!(introduce_line("42X", &c, true).contains(" cloak.int 0 42XAAAAAA services.int "));
    }

    #[test]
    fn uid_burst_adds_su_and_identified() {
        let mut m = Matrix::new();
        let mut c = local("42XAAAAAA", "NickServ");
        c.login = Some("acct".into());
        c.identified = true;
        m.add_client(c).unwrap();

        let lines = generate_burst(&m, &ModeTable::default(), opts(false));
        assert_eq!(
            lines[1..],
            [
                ":42X ENCAP * SU 42XAAAAAA :acct",
                ":42X ENCAP * IDENTIFIED 42XAAAAAA NickServ",
            ]
        );
    }

    #[test]
    fn channels_burst_only_local_members_in_chunks() {
        let table = ModeTable::default();
        let mut m = Matrix::new();
        m.add_server(Server::new("00A", "hub.example.net", "Hub", 1, None)).unwrap();
        m.add_client(Client::new("00AAAAAAA", "remote", "r", "h", "g", 1, "00A")).unwrap();
        m.join(&table, "00AAAAAAA", "#remote-only", 10).unwrap();

        let uids: Vec<String> = (0..20).map(|i| format!("42XAAAA{:02}", i)).collect();
        for uid in &uids {
            m.add_client(local(uid, &format!("bot{}", uid))).unwrap();
            m.join(&table, uid, "#big", 500).unwrap();
        }
        m.join(&table, "00AAAAAAA", "#big", 500).unwrap();
        {
            let chan = m.channel_mut("#big").unwrap();
            chan.modes.set('n', None);
            chan.modes.set('k', Some("key".into()));
            chan.modes.add_mask('b', "*!*@bad");
            chan.add_member(&table, &uids[0], "o");
            chan.topic = Some(crate::state::Topic {
                text: "hello there".into(),
                setter: "bot".into(),
                ts: 400,
            });
        }

        let lines = generate_burst(&m, &table, opts(true));
        let sjoins: Vec<&String> = lines.iter().filter(|l| l.contains(" SJOIN ")).collect();
        assert_eq!(sjoins.len(), 2);
        assert!(sjoins[0].starts_with(":42X SJOIN 500 #big +kn key :@42XAAAA00 42XAAAA01"));
        assert_eq!(sjoins[0].rsplit(':').next().unwrap().split(' ').count(), 15);
        assert_eq!(sjoins[1].rsplit(':').next().unwrap().split(' ').count(), 5);
        assert!(!lines.iter().any(|l| l.contains("00AAAAAAA")));
        assert!(lines.contains(&":42X BMASK 500 #big b :*!*@bad".to_string()));
        assert_eq!(lines.last().unwrap(), ":42X TB #big 400 bot :hello there");
    }
}
