//! Tracing spans for link observability.
//!
//! The session creates one `peer` span and enters it around every inbound
//! line and local operation; the registry nests a `command` span per verb.

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, debug_span, info_span};

    /// Span for one link session.
    pub fn peer(sid: &str, name: &str) -> Span {
        info_span!("peer", sid = %sid, name = %name)
    }

    /// Span for one dispatched verb.
    pub fn command(name: &str, source: Option<&str>) -> Span {
        match source {
            Some(source) => debug_span!("command", name = %name, source = %source),
            None => debug_span!("command", name = %name),
        }
    }

    /// Span for an operation issued by service logic.
    pub fn local_op(op: &'static str, uid: &str) -> Span {
        debug_span!("local_op", op, uid = %uid)
    }
}
