//! ts6-link - a TS6 leaf link engine for IRC services.
//!
//! Joins a charybdis-style network as a peer server, keeps a consistent
//! replica of its servers, clients and channels, and lets service logic
//! own pseudo-clients on it.

pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod session;
pub mod state;
pub mod sync;
pub mod telemetry;

pub use error::{LinkError, LinkResult};
pub use session::{NewClient, Session, SessionState, SessionStats};
pub use sync::{Link, LinkHandle};
