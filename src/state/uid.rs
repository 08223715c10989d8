//! UID allocation for locally-owned clients.

/// Allocates TS6 UIDs for clients this process introduces.
///
/// Format: SID (3 chars) + client ID (6 chars, base36 with `A`..`Z` as the
/// low digits), e.g. `42XAAAAAA`. The first character of the client ID is
/// always a letter, so a UID never collides with a nick or SID shape.
#[derive(Debug, Clone)]
pub struct UidGenerator {
    sid: String,
    counter: u64,
}

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// 26 * 36^5: past this the leading digit would turn numeric.
const ID_SPACE: u64 = 26 * 36 * 36 * 36 * 36 * 36;

impl UidGenerator {
    pub fn new(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            counter: 0,
        }
    }

    /// The SID every allocated UID starts with.
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Allocate the next UID. Wraps around after the ID space is exhausted;
    /// callers skip UIDs still in use.
    pub fn next_uid(&mut self) -> String {
        let n = self.counter % ID_SPACE;
        self.counter = self.counter.wrapping_add(1);
        format!("{}{}", self.sid, encode_id(n))
    }
}

fn encode_id(mut n: u64) -> String {
    let mut out = [b'A'; 6];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(n % 36) as usize];
        n /= 36;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uids_are_sequential() {
        let mut uids = UidGenerator::new("42X");
        assert_eq!(uids.next_uid(), "42XAAAAAA");
        assert_eq!(uids.next_uid(), "42XAAAAAB");
        assert_eq!(uids.sid(), "42X");
    }

    #[test]
    fn encoding_carries_into_higher_digits() {
        assert_eq!(encode_id(25), "AAAAAZ");
        assert_eq!(encode_id(26), "AAAAA0");
        assert_eq!(encode_id(35), "AAAAA9");
        assert_eq!(encode_id(36), "AAAABA");
    }

    #[test]
    fn leading_digit_stays_alphabetic() {
        let last = encode_id(ID_SPACE - 1);
        assert!(last.starts_with('Z'));
        assert_eq!(last.len(), 6);
    }
}
