//! The link task: one `Session` bound to one socket.
//!
//! The task owns the session outright. It multiplexes inbound lines, local
//! operations arriving through a [`LinkHandle`], and the keep-alive timer,
//! flushing the session's outbox after every step.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};
use ts6_proto::{LineCodec, ModeChange};

use crate::config::LimitsConfig;
use crate::error::{LinkError, LinkResult};
use crate::events::ClientListener;
use crate::session::{NewClient, Session, SessionStats};

/// Queue depth for commands from handles.
const COMMAND_QUEUE: usize = 256;

type Reply<T = ()> = oneshot::Sender<LinkResult<T>>;

/// A local operation for the session, with the channel for its result.
pub enum LinkCommand {
    Introduce {
        client: NewClient,
        listener: Box<dyn ClientListener>,
        reply: Reply<String>,
    },
    Join {
        uid: String,
        channel: String,
        reply: Reply,
    },
    Part {
        uid: String,
        channel: String,
        reason: Option<String>,
        reply: Reply,
    },
    Privmsg {
        uid: String,
        target: String,
        text: String,
        reply: Reply,
    },
    Notice {
        uid: String,
        target: String,
        text: String,
        reply: Reply,
    },
    Topic {
        uid: String,
        channel: String,
        text: String,
        reply: Reply,
    },
    Mode {
        uid: String,
        channel: String,
        modes: String,
        args: Vec<String>,
        reply: Reply<ModeChange>,
    },
    Kick {
        uid: String,
        channel: String,
        target: String,
        reason: String,
        reply: Reply,
    },
    Nick {
        uid: String,
        nick: String,
        reply: Reply,
    },
    Quit {
        uid: String,
        reason: String,
        reply: Reply,
    },
    Login {
        uid: String,
        account: Option<String>,
        reply: Reply,
    },
    Away {
        uid: String,
        reason: Option<String>,
        reply: Reply,
    },
    Chghost {
        uid: String,
        host: String,
        reply: Reply,
    },
    Stats {
        reply: oneshot::Sender<SessionStats>,
    },
    /// Close the link after telling the hub why.
    Shutdown { reason: String },
}

impl LinkCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Introduce { .. } => "introduce",
            Self::Join { .. } => "join",
            Self::Part { .. } => "part",
            Self::Privmsg { .. } => "privmsg",
            Self::Notice { .. } => "notice",
            Self::Topic { .. } => "topic",
            Self::Mode { .. } => "mode",
            Self::Kick { .. } => "kick",
            Self::Nick { .. } => "nick",
            Self::Quit { .. } => "quit",
            Self::Login { .. } => "login",
            Self::Away { .. } => "away",
            Self::Chghost { .. } => "chghost",
            Self::Stats { .. } => "stats",
            Self::Shutdown { .. } => "shutdown",
        }
    }
}

/// Cloneable handle for service logic. Every call is answered by the link
/// task; once the task is gone calls fail with [`LinkError::Closed`].
#[derive(Debug, Clone)]
pub struct LinkHandle {
    tx: mpsc::Sender<LinkCommand>,
}

impl LinkHandle {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> LinkCommand) -> LinkResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| LinkError::Closed)?;
        rx.await.map_err(|_| LinkError::Closed)?
    }

    pub async fn introduce(&self, client: NewClient, listener: Box<dyn ClientListener>) -> LinkResult<String> {
        self.request(|reply| LinkCommand::Introduce {
            client,
            listener,
            reply,
        })
        .await
    }

    pub async fn join(&self, uid: &str, channel: &str) -> LinkResult {
        self.request(|reply| LinkCommand::Join {
            uid: uid.to_string(),
            channel: channel.to_string(),
            reply,
        })
        .await
    }

    pub async fn part(&self, uid: &str, channel: &str, reason: Option<&str>) -> LinkResult {
        self.request(|reply| LinkCommand::Part {
            uid: uid.to_string(),
            channel: channel.to_string(),
            reason: reason.map(str::to_string),
            reply,
        })
        .await
    }

    pub async fn privmsg(&self, uid: &str, target: &str, text: &str) -> LinkResult {
        self.request(|reply| LinkCommand::Privmsg {
            uid: uid.to_string(),
            target: target.to_string(),
            text: text.to_string(),
            reply,
        })
        .await
    }

    pub async fn notice(&self, uid: &str, target: &str, text: &str) -> LinkResult {
        self.request(|reply| LinkCommand::Notice {
            uid: uid.to_string(),
            target: target.to_string(),
            text: text.to_string(),
            reply,
        })
        .await
    }

    pub async fn topic(&self, uid: &str, channel: &str, text: &str) -> LinkResult {
        self.request(|reply| LinkCommand::Topic {
            uid: uid.to_string(),
            channel: channel.to_string(),
            text: text.to_string(),
            reply,
        })
        .await
    }

    pub async fn mode(&self, uid: &str, channel: &str, modes: &str, args: &[&str]) -> LinkResult<ModeChange> {
        self.request(|reply| LinkCommand::Mode {
            uid: uid.to_string(),
            channel: channel.to_string(),
            modes: modes.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            reply,
        })
        .await
    }

    pub async fn kick(&self, uid: &str, channel: &str, target: &str, reason: &str) -> LinkResult {
        self.request(|reply| LinkCommand::Kick {
            uid: uid.to_string(),
            channel: channel.to_string(),
            target: target.to_string(),
            reason: reason.to_string(),
            reply,
        })
        .await
    }

    pub async fn nick(&self, uid: &str, nick: &str) -> LinkResult {
        self.request(|reply| LinkCommand::Nick {
            uid: uid.to_string(),
            nick: nick.to_string(),
            reply,
        })
        .await
    }

    pub async fn quit(&self, uid: &str, reason: &str) -> LinkResult {
        self.request(|reply| LinkCommand::Quit {
            uid: uid.to_string(),
            reason: reason.to_string(),
            reply,
        })
        .await
    }

    pub async fn login(&self, uid: &str, account: Option<&str>) -> LinkResult {
        self.request(|reply| LinkCommand::Login {
            uid: uid.to_string(),
            account: account.map(str::to_string),
            reply,
        })
        .await
    }

    pub async fn away(&self, uid: &str, reason: Option<&str>) -> LinkResult {
        self.request(|reply| LinkCommand::Away {
            uid: uid.to_string(),
            reason: reason.map(str::to_string),
            reply,
        })
        .await
    }

    pub async fn chghost(&self, uid: &str, host: &str) -> LinkResult {
        self.request(|reply| LinkCommand::Chghost {
            uid: uid.to_string(),
            host: host.to_string(),
            reply,
        })
        .await
    }

    pub async fn stats(&self) -> LinkResult<SessionStats> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LinkCommand::Stats { reply })
            .await
            .map_err(|_| LinkError::Closed)?;
        rx.await.map_err(|_| LinkError::Closed)
    }

    /// Ask the link to close. Returns once the request is queued.
    pub async fn shutdown(&self, reason: &str) -> LinkResult {
        self.tx
            .send(LinkCommand::Shutdown {
                reason: reason.to_string(),
            })
            .await
            .map_err(|_| LinkError::Closed)
    }
}

/// The link task.
#[derive(Debug)]
pub struct Link {
    session: Session,
    commands: mpsc::Receiver<LinkCommand>,
    limits: LimitsConfig,
}

impl Link {
    pub fn new(session: Session, limits: LimitsConfig) -> (Self, LinkHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let link = Self {
            session,
            commands,
            limits,
        };
        (link, LinkHandle { tx })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Drive the session over `stream` until the link closes. The session
    /// is torn down before returning; `Ok` means an orderly shutdown.
    pub async fn run<S>(&mut self, stream: S) -> LinkResult
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = Framed::new(stream, LineCodec::with_max_len(self.limits.max_line_len));
        let result = self.drive(&mut framed).await;

        let reason = match &result {
            Ok(()) => "link closed".to_string(),
            Err(e) => {
                error!(error = %e, code = e.error_code(), "link failed");
                if !matches!(e, LinkError::Io(_) | LinkError::Closed | LinkError::RemoteError(_)) {
                    let _ = framed.send(format!("ERROR :{}", e)).await;
                }
                e.to_string()
            }
        };
        let _ = SinkExt::<String>::close(&mut framed).await;
        self.session.teardown(&reason);
        info!(%reason, "link down");
        result
    }

    async fn drive<S>(&mut self, framed: &mut Framed<S, LineCodec>) -> LinkResult
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.session.connected()?;
        self.flush(framed).await?;

        let timeout = self.limits.ping_timeout();
        let mut ping = tokio::time::interval(self.limits.ping_interval());
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping.tick().await;
        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                frame = framed.next() => match frame {
                    Some(Ok(line)) => {
                        last_inbound = Instant::now();
                        trace!(%line, "<<");
                        self.session.handle_line(&line)?;
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        info!("hub closed the connection");
                        return Err(LinkError::Closed);
                    }
                },
                command = self.commands.recv() => match command {
                    Some(LinkCommand::Shutdown { reason }) => {
                        info!(%reason, "shutdown requested");
                        framed.send(format!("ERROR :{}", reason)).await?;
                        return Ok(());
                    }
                    Some(command) => self.execute(command),
                    None => {
                        debug!("every handle dropped");
                        return Ok(());
                    }
                },
                _ = ping.tick() => self.session.keepalive(),
                _ = tokio::time::sleep_until(last_inbound + timeout) => {
                    warn!(secs = timeout.as_secs(), "hub went silent");
                    return Err(LinkError::PingTimeout(timeout.as_secs()));
                }
            }
            self.flush(framed).await?;
        }
    }

    /// Write everything the session queued.
    async fn flush<S>(&mut self, framed: &mut Framed<S, LineCodec>) -> LinkResult
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let lines = self.session.take_output();
        if lines.is_empty() {
            return Ok(());
        }
        for line in lines {
            trace!(%line, ">>");
            framed.feed(line).await?;
        }
        SinkExt::<String>::flush(framed).await?;
        Ok(())
    }

    fn execute(&mut self, command: LinkCommand) {
        debug!(op = command.name(), "local operation");
        let s = &mut self.session;
        // A dropped receiver means the caller stopped waiting.
        match command {
            LinkCommand::Introduce {
                client,
                listener,
                reply,
            } => {
                let _ = reply.send(s.introduce(client, listener));
            }
            LinkCommand::Join { uid, channel, reply } => {
                let _ = reply.send(s.join(&uid, &channel));
            }
            LinkCommand::Part {
                uid,
                channel,
                reason,
                reply,
            } => {
                let _ = reply.send(s.part(&uid, &channel, reason.as_deref()));
            }
            LinkCommand::Privmsg {
                uid,
                target,
                text,
                reply,
            } => {
                let _ = reply.send(s.privmsg(&uid, &target, &text));
            }
            LinkCommand::Notice {
                uid,
                target,
                text,
                reply,
            } => {
                let _ = reply.send(s.notice(&uid, &target, &text));
            }
            LinkCommand::Topic {
                uid,
                channel,
                text,
                reply,
            } => {
                let _ = reply.send(s.topic(&uid, &channel, &text));
            }
            LinkCommand::Mode {
                uid,
                channel,
                modes,
                args,
                reply,
            } => {
                let _ = reply.send(s.mode(&uid, &channel, &modes, args.as_slice()));
            }
            LinkCommand::Kick {
                uid,
                channel,
                target,
                reason,
                reply,
            } => {
                let _ = reply.send(s.kick(&uid, &channel, &target, &reason));
            }
            LinkCommand::Nick { uid, nick, reply } => {
                let _ = reply.send(s.nick(&uid, &nick));
            }
            LinkCommand::Quit { uid, reason, reply } => {
                let _ = reply.send(s.quit(&uid, &reason));
            }
            LinkCommand::Login {
                uid,
                account,
                reply,
            } => {
                let _ = reply.send(s.login(&uid, account.as_deref()));
            }
            LinkCommand::Away { uid, reason, reply } => {
                let _ = reply.send(s.away(&uid, reason.as_deref()));
            }
            LinkCommand::Chghost { uid, host, reply } => {
                let _ = reply.send(s.chghost(&uid, &host));
            }
            LinkCommand::Stats { reply } => {
                let _ = reply.send(s.stats());
            }
            LinkCommand::Shutdown { .. } => {}
        }
    }
}
