//! Server-to-server synchronization.
//!
//! Handshake, burst generation, TS conflict resolution, netsplit cascade,
//! and the link task that binds a session to a socket.

pub mod burst;
pub mod handshake;
pub mod link;
pub mod resolve;
pub mod split;
pub mod stream;

pub use link::{Link, LinkCommand, LinkHandle};
pub use stream::S2SStream;
