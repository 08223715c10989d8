//! Entity model and State Registry.
//!
//! Contains the Matrix (per-session authoritative state) and the server,
//! client and channel records it owns.

mod channel;
mod client;
mod matrix;
mod server;
mod uid;

pub use channel::{Channel, ChannelModes, Member, Topic};
pub use client::Client;
pub use matrix::{Destination, Kline, Matrix, Source, is_channel_name, is_sid, is_uid};
pub use server::Server;
pub use uid::UidGenerator;
