//! Property tests for TS conflict resolution and the registry.

use std::collections::BTreeSet;

use proptest::prelude::*;
use ts6_link::state::{Client, Matrix, Server, UidGenerator};
use ts6_link::sync::burst::sjoin_lines;
use ts6_link::sync::resolve::{apply_sjoin, apply_tmode};
use ts6_proto::{Line, ModeTable, irc_eq, irc_to_lower};

const NO_ARGS: &[&str] = &[];

fn uid(n: usize) -> String {
    format!("1HB{:0>6}", n)
}

/// A registry holding the hub and `count` of its clients.
fn matrix_with_clients(count: usize) -> Matrix {
    let mut matrix = Matrix::new();
    matrix
        .add_server(Server::new("1HB", "hub.example.net", "Hub", 1, None))
        .unwrap();
    for n in 0..count {
        matrix
            .add_client(Client::new(uid(n), format!("n{}", n), "u", "h", "g", 1000, "1HB"))
            .unwrap();
    }
    matrix
}

fn flag_set() -> impl Strategy<Value = BTreeSet<char>> {
    proptest::collection::btree_set(proptest::sample::select(vec!['i', 'm', 'n', 'p', 's', 't']), 0..6)
}

fn mode_string(flags: &BTreeSet<char>) -> String {
    std::iter::once('+').chain(flags.iter().copied()).collect()
}

fn member_set(matrix: &Matrix, name: &str) -> BTreeSet<(String, String)> {
    matrix
        .channel(name)
        .unwrap()
        .members()
        .iter()
        .map(|m| (m.uid.clone(), m.status.clone()))
        .collect()
}

proptest! {
    #[test]
    fn sjoin_ts_rule(
        local_ts in 1u64..1000,
        incoming_ts in 1u64..1000,
        local in flag_set(),
        incoming in flag_set(),
    ) {
        let table = ModeTable::default();
        let mut matrix = matrix_with_clients(2);
        apply_sjoin(&mut matrix, &table, local_ts, "#p", &mode_string(&local), NO_ARGS, &uid(0)).unwrap();
        apply_sjoin(&mut matrix, &table, incoming_ts, "#p", &mode_string(&incoming), NO_ARGS, &uid(1)).unwrap();

        let chan = matrix.channel("#p").unwrap();
        let letters = chan.modes.letters();
        if incoming_ts > local_ts {
            prop_assert_eq!(chan.ts, local_ts);
            prop_assert_eq!(letters, local);
        } else if incoming_ts == local_ts {
            prop_assert_eq!(chan.ts, local_ts);
            prop_assert_eq!(letters, local.union(&incoming).copied().collect::<BTreeSet<_>>());
        } else {
            prop_assert_eq!(chan.ts, incoming_ts);
            prop_assert_eq!(letters, incoming);
        }
        prop_assert!(chan.is_member(&uid(0)));
        prop_assert!(chan.is_member(&uid(1)));
    }

    #[test]
    fn stale_tmode_changes_nothing(
        local_ts in 1u64..1000,
        ahead in 1u64..1000,
        flags in flag_set(),
    ) {
        let table = ModeTable::default();
        let mut matrix = matrix_with_clients(1);
        apply_sjoin(&mut matrix, &table, local_ts, "#p", "+n", NO_ARGS, &format!("@{}", uid(0))).unwrap();
        let before = matrix.channel("#p").unwrap().clone();

        let applied = apply_tmode(&mut matrix, &table, local_ts + ahead, "#p", &mode_string(&flags), NO_ARGS).unwrap();
        prop_assert!(applied.is_none());
        prop_assert_eq!(matrix.channel("#p").unwrap(), &before);
    }

    #[test]
    fn sjoin_chunks_rebuild_membership(
        statuses in proptest::collection::vec(proptest::sample::select(vec!["", "o", "v", "ov"]), 1..60),
        chunk in 1usize..20,
        with_key in any::<bool>(),
    ) {
        let table = ModeTable::default();
        let mut source = matrix_with_clients(statuses.len());
        source.ensure_channel("#big", 500);
        for (n, status) in statuses.iter().enumerate() {
            source.join_with_status(&table, &uid(n), "#big", 500, status).unwrap();
        }
        if with_key {
            source.channel_mut("#big").unwrap().modes.set('k', Some("secret".into()));
        }

        let chan = source.channel("#big").unwrap();
        let uids: Vec<String> = chan.members().iter().map(|m| m.uid.clone()).collect();
        let refs: Vec<&str> = uids.iter().map(String::as_str).collect();
        let lines = sjoin_lines("1HB", &table, chan, &refs, chunk);
        prop_assert_eq!(lines.len(), statuses.len().div_ceil(chunk));

        let mut replica = matrix_with_clients(statuses.len());
        for raw in &lines {
            let line: Line = raw.parse().unwrap();
            let p = &line.params;
            let ts: u64 = p[0].parse().unwrap();
            apply_sjoin(&mut replica, &table, ts, &p[1], &p[2], &p[3..p.len() - 1], &p[p.len() - 1]).unwrap();
        }

        prop_assert_eq!(member_set(&replica, "#big"), member_set(&source, "#big"));
        prop_assert_eq!(replica.channel("#big").unwrap().ts, 500);
        prop_assert_eq!(replica.channel("#big").unwrap().modes.param('k'), with_key.then_some("secret"));
    }

    #[test]
    fn repeated_join_is_idempotent(times in 1usize..5) {
        let table = ModeTable::default();
        let mut matrix = matrix_with_clients(1);
        for _ in 0..times {
            matrix.join(&table, &uid(0), "#j", 100).unwrap();
        }
        prop_assert_eq!(matrix.channel("#j").unwrap().members().len(), 1);
    }

    #[test]
    fn casefold_is_idempotent(s in "[ -~]{0,24}") {
        let once = irc_to_lower(&s);
        prop_assert_eq!(irc_to_lower(&once), once.clone());
        prop_assert!(irc_eq(&s, &s.to_ascii_uppercase()));
    }

    #[test]
    fn uids_are_unique_and_well_formed(count in 1usize..500) {
        let mut uids = UidGenerator::new("42X");
        let mut seen = BTreeSet::new();
        for _ in 0..count {
            let uid = uids.next_uid();
            prop_assert_eq!(uid.len(), 9);
            prop_assert!(uid.starts_with("42X"));
            prop_assert!(uid[3..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
            prop_assert!(seen.insert(uid));
        }
    }
}
