//! # ts6-proto
//!
//! Wire-level primitives for the TS6 server-to-server dialect spoken by
//! charybdis-derived daemons.
//!
//! - [`LineCodec`]: CR/LF framing with a hard line-length ceiling
//! - [`Line`]: a tokenized wire line (`[:source] VERB params... [:trailing]`)
//! - [`ModeTable`] / [`parse_modes`]: the parameter-arity table derived from
//!   `PREFIX` and `CHANMODES`, and the mode-string tokenizer that uses it
//! - [`irc_to_lower`] / [`irc_eq`]: RFC 1459 case mapping
//!
//! ```rust
//! use ts6_proto::{Line, ModeTable, parse_modes};
//!
//! let line: Line = ":42XAAAAAB TMODE 100 #ops +o 42XAAAAAC".parse().unwrap();
//! assert_eq!(line.verb, "TMODE");
//!
//! let change = parse_modes(&ModeTable::default(), &line.params[2], &line.params[3..]).unwrap();
//! assert_eq!(change.added, vec![('o', Some("42XAAAAAC".to_string()))]);
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod casemap;
pub mod codec;
pub mod error;
pub mod line;
pub mod mode;

pub use self::casemap::{irc_eq, irc_lower_char, irc_to_lower};
pub use self::codec::{LineCodec, DEFAULT_MAX_LINE_LEN};
pub use self::error::{ModeError, ProtoError};
pub use self::line::Line;
pub use self::mode::{parse_modes, ModeChange, ModeClass, ModeTable};
