//! Integration test common infrastructure.
//!
//! A scripted hub on the far side of an in-memory duplex pipe, with the
//! link task running against the near side.

#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use ts6_link::config::Config;
use ts6_link::events::{ClientEvent, SessionEvent};
use ts6_link::{Link, LinkHandle, LinkResult, Session};

pub const CONFIG: &str = r#"
[server]
name = "services.example.net"
sid = "42X"
description = "Network Services"

[uplink]
name = "hub.example.net"
hostname = "127.0.0.1"
port = 6667
password = "linkpass"
accept_password = "hubpass"
sid = "1HB"
"#;

pub const HUB_CAPAB: &str = "QS EX IE KLN UNKLN ENCAP TB SERVICES EUID EOPMOD";

/// The hub end of the pipe.
pub struct FakeHub {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    wait: Duration,
}

/// A running link plus everything a test needs to poke at it.
pub struct Harness {
    pub hub: FakeHub,
    pub handle: LinkHandle,
    pub task: JoinHandle<(Link, LinkResult)>,
    pub events: UnboundedReceiver<SessionEvent>,
    pub events_tx: UnboundedSender<SessionEvent>,
}

impl Harness {
    pub fn start() -> anyhow::Result<Self> {
        Self::with_config(CONFIG)
    }

    pub fn with_config(text: &str) -> anyhow::Result<Self> {
        let config = Config::parse(text)?;
        let (events_tx, events) = unbounded_channel();
        let session = Session::new(&config, Box::new(events_tx.clone()))?;
        let (mut link, handle) = Link::new(session, config.limits.clone());

        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(async move {
            let result = link.run(ours).await;
            (link, result)
        });

        let (read, write) = tokio::io::split(theirs);
        Ok(Self {
            hub: FakeHub {
                reader: BufReader::new(read),
                writer: write,
                wait: Duration::from_secs(5),
            },
            handle,
            task,
            events,
            events_tx,
        })
    }

    /// Client events delivered so far, in order.
    pub fn client_events(&mut self) -> Vec<(String, ClientEvent)> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let SessionEvent::Client { uid, event } = event {
                out.push((uid, event));
            }
        }
        out
    }

    /// Wait for the link task to finish.
    pub async fn finish(self) -> anyhow::Result<(Link, LinkResult)> {
        Ok(timeout(Duration::from_secs(5), self.task).await??)
    }
}

impl FakeHub {
    /// Change how long `recv` waits for a line.
    pub fn set_wait(&mut self, wait: Duration) {
        self.wait = wait;
    }

    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn send_all(&mut self, lines: &[&str]) -> anyhow::Result<()> {
        for line in lines {
            self.send(line).await?;
        }
        Ok(())
    }

    /// Next line from the link, without its terminator.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        let n = timeout(self.wait, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("link closed the connection");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Lines up to and including the first one matching `predicate`.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<String>>
    where
        F: FnMut(&str) -> bool,
    {
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await?;
            let done = predicate(&line);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    /// Whether the link has closed its end.
    pub async fn closed(&mut self) -> anyhow::Result<bool> {
        let mut line = String::new();
        loop {
            line.clear();
            match timeout(self.wait, self.reader.read_line(&mut line)).await? {
                Ok(0) | Err(_) => return Ok(true),
                Ok(_) => continue,
            }
        }
    }

    /// Read our greeting.
    pub async fn expect_greeting(&mut self) -> anyhow::Result<Vec<String>> {
        let lines = self.recv_until(|l| l.starts_with("SERVER ")).await?;
        anyhow::ensure!(lines[0] == "PASS linkpass TS 6 :42X", "bad PASS: {}", lines[0]);
        Ok(lines)
    }

    /// Introduce the hub and return everything we sent up to `SVINFO`.
    pub async fn introduce(&mut self, capab: &str) -> anyhow::Result<Vec<String>> {
        self.send("PASS hubpass TS 6 :1HB").await?;
        self.send(&format!("CAPAB :{}", capab)).await?;
        self.send("SERVER hub.example.net 1 :Hub Server").await?;
        self.recv_until(|l| l.starts_with("SVINFO ")).await
    }

    /// End the hub's burst and collect our remaining burst lines.
    pub async fn end_burst(&mut self) -> anyhow::Result<Vec<String>> {
        self.send("SVINFO 6 3 0 :1700000000").await?;
        self.send("PING :1HB").await?;
        let mut lines = self.recv_until(|l| l.contains(" PONG ")).await?;
        lines.pop();
        Ok(lines)
    }

    /// Greeting, introduction and an empty burst from the hub.
    pub async fn link_up(&mut self) -> anyhow::Result<Vec<String>> {
        self.expect_greeting().await?;
        let mut burst = self.introduce(HUB_CAPAB).await?;
        burst.extend(self.end_burst().await?);
        Ok(burst)
    }
}
