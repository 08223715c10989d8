//! RFC 1459 case mapping.
//!
//! TS6 networks fold nicknames and channel names with the `rfc1459`
//! mapping: ASCII letters plus `[]\~` ↔ `{}|^`. Every registry key in the
//! link engine goes through [`irc_to_lower`].

/// Fold a single character.
#[inline]
pub const fn irc_lower_char(c: char) -> char {
    match c {
        'A'..='Z' => (c as u8 + 32) as char,
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        _ => c,
    }
}

/// Fold a string into its lookup key.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(irc_lower_char).collect()
}

/// Case-insensitive equality under the same mapping.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .chars()
            .zip(b.chars())
            .all(|(x, y)| irc_lower_char(x) == irc_lower_char(y))
}
