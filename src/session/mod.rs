//! The Protocol Session.
//!
//! A `Session` owns one State Registry and one verb registry. Every inbound
//! line is one synchronous state transition:
//!
//! ```text
//! raw line -> Line -> Registry::dispatch -> handler -> Matrix + fan-out
//! ```
//!
//! Output for the hub accumulates in an outbox that the transport drains
//! with [`Session::take_output`] after each call.

mod local;

pub use local::NewClient;

use tracing::{Span, debug, error, warn};
use ts6_proto::{Line, ModeTable};

use crate::config::Config;
use crate::error::{LinkError, LinkResult};
use crate::events::{Listeners, ServiceHooks};
use crate::handlers::{Context, Outbox, Registry, unix_now};
use crate::state::{Matrix, Server, UidGenerator};
use crate::sync::handshake::HandshakeMachine;
pub use crate::sync::handshake::SessionState;
use crate::sync::split::handle_netsplit;
use crate::telemetry::spans;

/// Counters and sizes for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub state: SessionState,
    pub lines_in: u64,
    pub lines_out: u64,
    pub dropped: u64,
    pub servers: usize,
    pub clients: usize,
    pub channels: usize,
    /// Per-verb dispatch counts, most used first.
    pub commands: Vec<(&'static str, u64)>,
}

/// One link to the hub.
pub struct Session {
    registry: Registry,
    ctx: Context,
    span: Span,
    lines_in: u64,
    lines_out: u64,
    dropped: u64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("ctx", &self.ctx)
            .field("lines_in", &self.lines_in)
            .field("lines_out", &self.lines_out)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session from configuration. Our own server is registered
    /// immediately so a hub reusing our SID or name is caught as a
    /// duplicate.
    pub fn new(config: &Config, hooks: Box<dyn ServiceHooks>) -> LinkResult<Self> {
        let table = config.modes.table()?.union(&ModeTable::default());
        let server = &config.server;

        let mut matrix = Matrix::new();
        matrix.add_server(Server::new(
            server.sid.clone(),
            server.name.clone(),
            server.description.clone(),
            0,
            None,
        ))?;

        let ctx = Context {
            matrix,
            handshake: HandshakeMachine::new(
                server.sid.clone(),
                server.name.clone(),
                server.description.clone(),
            ),
            link: config.uplink.clone(),
            limits: config.limits.clone(),
            table,
            umodes: ModeTable::user_modes(),
            uids: UidGenerator::new(server.sid.clone()),
            listeners: Listeners::default(),
            hooks,
            out: Outbox::default(),
            clock: unix_now,
        };

        Ok(Self {
            registry: Registry::new(),
            span: spans::peer(&server.sid, &config.uplink.name),
            ctx,
            lines_in: 0,
            lines_out: 0,
            dropped: 0,
        })
    }

    /// Replace the Unix time source.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.ctx.clock = clock;
        self
    }

    pub fn state(&self) -> SessionState {
        self.ctx.state()
    }

    /// The State Registry.
    pub fn matrix(&self) -> &Matrix {
        &self.ctx.matrix
    }

    /// The channel mode arity table in use.
    pub fn mode_table(&self) -> &ModeTable {
        &self.ctx.table
    }

    /// The hub's SID once it has sent `PASS`.
    pub fn hub_sid(&self) -> Option<&str> {
        self.ctx.handshake.hub_sid()
    }

    pub fn local_sid(&self) -> &str {
        self.ctx.local_sid()
    }

    /// Transport is up: send our handshake and start registering.
    pub fn connected(&mut self) -> LinkResult {
        let span = self.span.clone();
        let _enter = span.enter();
        self.ctx.handshake.transition(SessionState::Registering)?;
        for line in self.ctx.handshake.greeting(&self.ctx.link) {
            self.ctx.send_raw(line);
        }
        Ok(())
    }

    /// Process one CR/LF-stripped line.
    ///
    /// Recoverable problems are logged and the line is dropped with no
    /// state change; the result is `Ok`. A fatal error is returned and the
    /// caller must close the transport.
    pub fn handle_line(&mut self, raw: &str) -> LinkResult {
        let span = self.span.clone();
        let _enter = span.enter();
        self.lines_in += 1;

        let line: Line = match raw.parse() {
            Ok(line) => line,
            Err(e) => {
                self.dropped += 1;
                warn!(error = %e, "unparseable line dropped");
                return Ok(());
            }
        };

        match self.registry.dispatch(&mut self.ctx, &line) {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => {
                error!(error = %e, code = e.error_code(), %raw, "fatal protocol error");
                Err(e)
            }
            Err(LinkError::UnrecognizedVerb(verb)) => {
                self.dropped += 1;
                debug!(%verb, "no handler, line dropped");
                Ok(())
            }
            Err(e) => {
                self.dropped += 1;
                warn!(error = %e, code = e.error_code(), %raw, "line dropped");
                Ok(())
            }
        }
    }

    /// Queue a keep-alive `PING` for the hub. Nothing is sent before the
    /// hub has introduced itself.
    pub fn keepalive(&mut self) {
        let Some(hub) = self.ctx.handshake.hub_sid().map(str::to_string) else {
            return;
        };
        let ping = format!(":{} PING {} :{}", self.ctx.local_sid(), self.ctx.local_name(), hub);
        self.ctx.send(ping);
    }

    /// Drain lines queued for the hub.
    pub fn take_output(&mut self) -> Vec<String> {
        let lines = self.ctx.out.drain();
        self.lines_out += lines.len() as u64;
        lines
    }

    /// The transport is gone: everything reached through the hub splits
    /// away. Locally-owned clients stay.
    pub fn teardown(&mut self, reason: &str) {
        let span = self.span.clone();
        let _enter = span.enter();
        let Some(hub) = self.ctx.handshake.hub_sid().map(str::to_string) else {
            return;
        };
        if self.ctx.matrix.server(&hub).is_err() {
            return;
        }
        match handle_netsplit(&mut self.ctx, &hub, reason) {
            Ok(removed) => debug!(%hub, removed, "session torn down"),
            Err(e) => warn!(%hub, error = %e, "teardown cleanup failed"),
        }
        self.ctx.out.drain();
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            state: self.state(),
            lines_in: self.lines_in,
            lines_out: self.lines_out,
            dropped: self.dropped,
            servers: self.ctx.matrix.servers().count(),
            clients: self.ctx.matrix.clients().count(),
            channels: self.ctx.matrix.channels().count(),
            commands: self.registry.get_command_stats(),
        }
    }
}
