//! Tokenized TS6 wire lines.
//!
//! ```text
//! [:source] VERB [param ...] [:trailing]
//! ```
//!
//! The tokenizer is a small nom grammar. Unlike client-protocol parsers it
//! does not cap the parameter count: `SJOIN` mode arguments and `TMODE`
//! parameter lists routinely exceed the RFC 2812 limit of 15.

use std::fmt;
use std::str::FromStr;

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0},
    combinator::opt,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

use crate::error::ProtoError;

/// A single protocol line, split into source, verb and parameters.
///
/// The verb is stored upper-cased; the trailing parameter (if any) is the
/// last element of `params` with its leading `:` removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Source prefix without the leading `:`.
    pub source: Option<String>,
    /// Command verb, ASCII upper-case.
    pub verb: String,
    /// Positional parameters, trailing included.
    pub params: Vec<String>,
}

fn parse_source(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

fn parse_verb(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric())(input)
}

/// Split the remainder after the verb. Consecutive spaces collapse.
fn parse_params(input: &str) -> SmallVec<[&str; 16]> {
    let mut params = SmallVec::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            break;
        }
        let end = rest.find(' ').unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    params
}

fn parse_line(input: &str) -> IResult<&str, (Option<&str>, &str, SmallVec<[&str; 16]>)> {
    let (input, _) = space0(input)?;
    let (input, source) = opt(parse_source)(input)?;
    let (input, _) = space0(input)?;
    let (input, verb) = parse_verb(input)?;

    // A verb glued to a non-space character (`PING:x`) is not a verb.
    if !(input.is_empty() || input.starts_with(' ')) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Space,
        )));
    }

    Ok(("", (source, verb, parse_params(input))))
}

impl Line {
    /// Build a line from parts.
    pub fn new<S, V, I, P>(source: Option<S>, verb: V, params: I) -> Self
    where
        S: Into<String>,
        V: AsRef<str>,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            source: source.map(Into::into),
            verb: verb.as_ref().to_ascii_uppercase(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Positional parameter `n`, if present.
    pub fn arg(&self, n: usize) -> Option<&str> {
        self.params.get(n).map(String::as_str)
    }

    /// The last parameter, if any.
    pub fn last(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Unwrap one level of `ENCAP`.
    ///
    /// `:src ENCAP <mask> <verb> [args...]` becomes `:src <verb> [args...]`,
    /// keeping the original source. Returns `None` if this is not an
    /// envelope or the envelope carries no inner verb.
    pub fn unwrap_encap(&self) -> Option<Line> {
        if self.verb != "ENCAP" || self.params.len() < 2 {
            return None;
        }
        Some(Line {
            source: self.source.clone(),
            verb: self.params[1].to_ascii_uppercase(),
            params: self.params[2..].to_vec(),
        })
    }
}

impl FromStr for Line {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_line(s) {
            Ok((_, (source, verb, params))) => Ok(Line {
                source: source.map(str::to_string),
                verb: verb.to_ascii_uppercase(),
                params: params.into_iter().map(str::to_string).collect(),
            }),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ProtoError::InvalidLine {
                line: s.to_string(),
                position: s.len() - e.input.len(),
            }),
            Err(nom::Err::Incomplete(_)) => Err(ProtoError::InvalidLine {
                line: s.to_string(),
                position: s.len(),
            }),
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, ":{} ", source)?;
        }
        f.write_str(&self.verb)?;

        let count = self.params.len();
        for (i, param) in self.params.iter().enumerate() {
            let needs_colon =
                i + 1 == count && (param.is_empty() || param.contains(' ') || param.starts_with(':'));
            if needs_colon {
                write!(f, " :{}", param)?;
            } else {
                write!(f, " {}", param)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Tokenizing
    // ========================================================================

    #[test]
    fn parses_unprefixed_ping() {
        let line: Line = "PING :hub.example.net".parse().unwrap();
        assert_eq!(line.source, None);
        assert_eq!(line.verb, "PING");
        assert_eq!(line.params, vec!["hub.example.net"]);
    }

    #[test]
    fn parses_euid() {
        let raw = ":00A EUID alice 1 1700000000 +i alice example.org 0 00AAAAAAB * * :Alice Liddell";
        let line: Line = raw.parse().unwrap();
        assert_eq!(line.source.as_deref(), Some("00A"));
        assert_eq!(line.verb, "EUID");
        assert_eq!(line.params.len(), 11);
        assert_eq!(line.arg(7), Some("00AAAAAAB"));
        assert_eq!(line.last(), Some("Alice Liddell"));
    }

    #[test]
    fn parses_tmode_without_trailing() {
        let line: Line = ":00AAAAAAB TMODE 100 #test +ov 00AAAAAAB 00AAAAAAC"
            .parse()
            .unwrap();
        assert_eq!(
            line.params,
            vec!["100", "#test", "+ov", "00AAAAAAB", "00AAAAAAC"]
        );
    }

    #[test]
    fn keeps_more_than_fifteen_params() {
        let args: Vec<String> = (0..20).map(|i| format!("m{}", i)).collect();
        let raw = format!(":00A TMODE 1 #x +{} {}", "b".repeat(20), args.join(" "));
        let line: Line = raw.parse().unwrap();
        assert_eq!(line.params.len(), 23);
    }

    #[test]
    fn empty_trailing_is_a_param() {
        let line: Line = ":00AAAAAAB AWAY :".parse().unwrap();
        assert_eq!(line.params, vec![""]);
        let line: Line = ":00AAAAAAB AWAY".parse().unwrap();
        assert!(line.params.is_empty());
    }

    #[test]
    fn lowercase_verb_is_normalized() {
        let line: Line = "ping :x".parse().unwrap();
        assert_eq!(line.verb, "PING");
    }

    #[test]
    fn rejects_missing_verb() {
        assert!(":00A".parse::<Line>().is_err());
        assert!("".parse::<Line>().is_err());
        assert!(":00A #chan".parse::<Line>().is_err());
    }

    // ========================================================================
    // ENCAP
    // ========================================================================

    #[test]
    fn unwraps_encap_preserving_source() {
        let line: Line = ":00A ENCAP * SU 00AAAAAAB :alice".parse().unwrap();
        let inner = line.unwrap_encap().unwrap();
        assert_eq!(inner.source.as_deref(), Some("00A"));
        assert_eq!(inner.verb, "SU");
        assert_eq!(inner.params, vec!["00AAAAAAB", "alice"]);
    }

    #[test]
    fn encap_without_inner_verb() {
        let line: Line = ":00A ENCAP *".parse().unwrap();
        assert!(line.unwrap_encap().is_none());
        let line: Line = ":00A PRIVMSG #x :hi".parse().unwrap();
        assert!(line.unwrap_encap().is_none());
    }

    // ========================================================================
    // Display
    // ========================================================================

    #[test]
    fn display_adds_colon_when_needed() {
        let line = Line::new(Some("42XAAAAAB"), "privmsg", ["#ops", "hello there"]);
        assert_eq!(line.to_string(), ":42XAAAAAB PRIVMSG #ops :hello there");

        let line = Line::new(None::<String>, "PONG", ["hub.example.net"]);
        assert_eq!(line.to_string(), "PONG hub.example.net");

        let line = Line::new(Some("42X"), "SU", ["42XAAAAAB", ""]);
        assert_eq!(line.to_string(), ":42X SU 42XAAAAAB :");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn tokenizer_never_panics(s in "\\PC{0,200}") {
            let _ = s.parse::<Line>();
        }

        #[test]
        fn trailing_survives_display(text in "[a-zA-Z0-9 :#]{0,40}") {
            let line = Line::new(Some("42XAAAAAB"), "PRIVMSG", ["#ops".to_string(), text.clone()]);
            let reparsed: Line = line.to_string().parse().unwrap();
            prop_assert_eq!(reparsed.last(), Some(text.as_str()));
        }
    }
}
