//! TS conflict resolution.
//!
//! Two sides of a split each keep their own copy of a channel. When they
//! meet again the copy with the lower channel TS is authoritative for
//! modes and member status. Membership is always merged.
//!
//! | incoming vs local | TS            | modes                    | status   |
//! |-------------------|---------------|--------------------------|----------|
//! | no local channel  | incoming      | incoming                 | kept     |
//! | lower             | lowered       | replaced by incoming     | reset    |
//! | equal             | unchanged     | merged                   | kept     |
//! | higher            | unchanged     | incoming ignored         | dropped  |

use std::cmp::Ordering;

use tracing::{debug, info, warn};
use ts6_proto::{ModeChange, ModeClass, ModeTable, parse_modes};

use crate::error::{LinkError, LinkResult};
use crate::state::{Matrix, Topic};

/// What an SJOIN changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SjoinOutcome {
    /// Channel display name.
    pub channel: String,
    pub created: bool,
    /// The channel TS was lowered and local modes were wiped.
    pub ts_changed: bool,
    /// Newly added member UIDs, in line order.
    pub joined: Vec<String>,
    /// Modes applied from the incoming side, if any.
    pub modes: Option<ModeChange>,
}

/// Split an SJOIN member token such as `@+42XAAAAAB` into status letters
/// and UID.
pub fn split_member_token(table: &ModeTable, token: &str) -> (String, String) {
    let mut status = String::new();
    let mut rest = token;
    while let Some(c) = rest.chars().next() {
        match table.letter_for_symbol(c) {
            Some(letter) => {
                status.push(letter);
                rest = &rest[c.len_utf8()..];
            }
            None => break,
        }
    }
    (status, rest.to_string())
}

/// Apply a burst channel-state message.
///
/// `members` is the space-separated member list. Members the registry does
/// not know are skipped with a warning; a channel left with no members is
/// dropped unless it is `+P`. A bad mode string is rejected before anything
/// is touched.
pub fn apply_sjoin<S: AsRef<str>>(
    matrix: &mut Matrix,
    table: &ModeTable,
    ts: u64,
    name: &str,
    modes: &str,
    mode_args: &[S],
    members: &str,
) -> LinkResult<SjoinOutcome> {
    let ordering = match matrix.channel(name) {
        Ok(chan) => Some(ts.cmp(&chan.ts)),
        Err(_) => None,
    };

    let incoming = match ordering {
        Some(Ordering::Greater) => None,
        _ => Some(parse_modes(table, modes, mode_args)?),
    };
    let keep_status = !matches!(ordering, Some(Ordering::Greater));

    let mut outcome = SjoinOutcome {
        created: matrix.ensure_channel(name, ts),
        ..SjoinOutcome::default()
    };
    let chan = matrix.channel_mut(name)?;
    outcome.channel = chan.name.clone();

    match ordering {
        Some(Ordering::Less) => {
            info!(channel = %chan.name, old_ts = chan.ts, new_ts = ts, "channel TS lowered");
            chan.reset_ts(ts);
            outcome.ts_changed = true;
        }
        Some(Ordering::Greater) => {
            debug!(channel = %chan.name, local_ts = chan.ts, ts, "ignoring modes from newer channel");
        }
        _ => {}
    }
    if let Some(change) = incoming {
        chan.apply_modes(table, &change);
        if !change.is_empty() {
            outcome.modes = Some(change);
        }
    }

    for token in members.split_whitespace() {
        let (status, uid) = split_member_token(table, token);
        let status = if keep_status { status } else { String::new() };
        if matrix.client(&uid).is_err() {
            warn!(channel = %outcome.channel, %uid, "SJOIN references unknown UID");
            continue;
        }
        if matrix.join_with_status(table, &uid, name, ts, &status)? {
            outcome.joined.push(uid);
        }
    }

    // Nobody resolved: don't keep an empty record around.
    matrix.collect_channel(name);
    Ok(outcome)
}

/// Apply a `TMODE`. Returns `None` when the message carries a TS newer than
/// the channel's and was discarded.
pub fn apply_tmode<S: AsRef<str>>(
    matrix: &mut Matrix,
    table: &ModeTable,
    ts: u64,
    name: &str,
    modes: &str,
    mode_args: &[S],
) -> LinkResult<Option<ModeChange>> {
    let chan = matrix.channel_mut(name)?;
    if ts > chan.ts {
        debug!(channel = %chan.name, local_ts = chan.ts, ts, "discarding TMODE from stale view");
        return Ok(None);
    }
    let change = parse_modes(table, modes, mode_args)?;
    chan.apply_modes(table, &change);
    matrix.collect_channel(name);
    Ok(Some(change))
}

/// Apply a topic burst (`TB`). The older topic wins; a channel without a
/// topic takes any. Returns `true` when the topic was replaced.
pub fn apply_topic_burst(
    matrix: &mut Matrix,
    name: &str,
    topic_ts: u64,
    setter: &str,
    text: &str,
) -> LinkResult<bool> {
    let chan = matrix.channel_mut(name)?;
    let accept = match &chan.topic {
        None => true,
        Some(current) => topic_ts < current.ts,
    };
    if accept {
        chan.topic = Some(Topic {
            text: text.to_string(),
            setter: setter.to_string(),
            ts: topic_ts,
        });
    } else {
        debug!(channel = %chan.name, topic_ts, "discarding newer topic burst");
    }
    Ok(accept)
}

/// Apply a `BMASK` list burst. Ignored when `ts` is newer than the channel.
/// Returns the masks added.
pub fn apply_bmask(
    matrix: &mut Matrix,
    table: &ModeTable,
    ts: u64,
    name: &str,
    letter: char,
    masks: &str,
) -> LinkResult<Vec<String>> {
    if table.classify(letter) != Some(ModeClass::List) {
        return Err(LinkError::malformed("BMASK", format!("'{}' is not a list mode", letter)));
    }
    let chan = matrix.channel_mut(name)?;
    if ts > chan.ts {
        debug!(channel = %chan.name, local_ts = chan.ts, ts, "discarding BMASK from stale view");
        return Ok(Vec::new());
    }
    let added: Vec<String> = masks.split_whitespace().map(str::to_string).collect();
    for mask in &added {
        chan.modes.add_mask(letter, mask.as_str());
    }
    Ok(added)
}

/// What a `JOIN` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinOutcome {
    pub channel: String,
    pub created: bool,
    pub ts_changed: bool,
    pub joined: bool,
}

/// Apply a remote `JOIN <ts> <chan> +`. A lower TS than the local channel
/// is a TS change, as with SJOIN.
pub fn apply_join(
    matrix: &mut Matrix,
    table: &ModeTable,
    uid: &str,
    ts: u64,
    name: &str,
) -> LinkResult<JoinOutcome> {
    matrix.client(uid)?;
    let mut outcome = JoinOutcome {
        created: matrix.ensure_channel(name, ts),
        ..JoinOutcome::default()
    };
    let chan = matrix.channel_mut(name)?;
    outcome.channel = chan.name.clone();
    if ts < chan.ts {
        info!(channel = %chan.name, old_ts = chan.ts, new_ts = ts, "channel TS lowered by JOIN");
        chan.reset_ts(ts);
        outcome.ts_changed = true;
    }
    outcome.joined = matrix.join_with_status(table, uid, name, ts, "")?;
    Ok(outcome)
}
