//! Core handler infrastructure: the verb registry and the handler context.

pub mod context;
pub mod registry;

pub use context::{Context, Handler, HandlerResult, Outbox, unix_now};
pub use registry::Registry;
