//! ts6link - links to a TS6 hub and keeps the configured pseudo-clients
//! on the network.

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ts6_link::config::{Config, LogFormat, validate};
use ts6_link::events::SessionEvent;
use ts6_link::sync::stream;
use ts6_link::{Link, NewClient, Session};

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true);
    match format {
        LogFormat::Json => builder.json().flatten_event(true).init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ts6link.toml".to_string());

    // A config that fails to load still gets its error logged, as text.
    let loaded = Config::load(&config_path);
    init_tracing(loaded.as_ref().map(|c| c.log.format).unwrap_or_default());

    let config = loaded.map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;
    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} problem(s) in {}", errors.len(), config_path);
    }

    info!(
        server = %config.server.name,
        sid = %config.server.sid,
        uplink = %config.uplink.address(),
        "Starting ts6link"
    );

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let session = Session::new(&config, Box::new(events_tx.clone()))?;
    let (mut link, handle) = Link::new(session, config.limits.clone());

    let stream = stream::connect(&config.uplink).await?;
    let mut link_task = tokio::spawn(async move { link.run(stream).await });
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            log_event(&event);
        }
    });

    for block in &config.clients {
        let uid = handle
            .introduce(NewClient::from(block), Box::new(events_tx.clone()))
            .await?;
        info!(%uid, nick = %block.nick, "Pseudo-client online");
        for channel in &block.channels {
            if let Err(e) = handle.join(&uid, channel).await {
                warn!(%uid, %channel, error = %e, "Autojoin failed");
            }
        }
    }
    drop(events_tx);

    tokio::select! {
        result = &mut link_task => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, closing link");
            handle.shutdown("Services shutting down").await?;
            link_task.await??;
        }
    }
    Ok(())
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Client { uid, event } => info!(%uid, ?event, "client event"),
        SessionEvent::ClientIntroduced { uid, nick } => info!(%uid, %nick, "client introduced"),
        SessionEvent::LoginChanged { uid, account } => info!(%uid, ?account, "login changed"),
        SessionEvent::BurstStarted => info!("burst started"),
        SessionEvent::BurstEnded => info!("burst ended"),
        SessionEvent::ServerSplit { sid, name } => warn!(%sid, %name, "server split"),
        SessionEvent::KlineAdded(kline) => info!(user = %kline.user, host = %kline.host, "kline added"),
        SessionEvent::KlineRemoved(kline) => info!(user = %kline.user, host = %kline.host, "kline removed"),
    }
}
