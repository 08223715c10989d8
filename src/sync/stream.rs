//! Server-to-Server stream abstraction.
//!
//! Provides a unified stream type for both plaintext and TLS uplinks.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream as ClientTlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::{info, warn};

use crate::config::LinkBlock;
use crate::error::LinkResult;

/// A connection to the hub, plaintext or TLS.
pub enum S2SStream {
    /// Plaintext TCP connection.
    Plain(TcpStream),
    /// TLS-encrypted client connection.
    TlsClient(Box<ClientTlsStream<TcpStream>>),
}

impl S2SStream {
    /// Returns true if this is a TLS-encrypted connection.
    pub fn is_tls(&self) -> bool {
        !matches!(self, Self::Plain(_))
    }
}

/// Open the uplink described by `link`, wrapping it in TLS when configured.
pub async fn connect(link: &LinkBlock) -> LinkResult<S2SStream> {
    let address = link.address();
    let tcp = TcpStream::connect(&address).await?;
    tcp.set_nodelay(true)?;
    if !link.tls {
        info!(%address, "connected");
        return Ok(S2SStream::Plain(tcp));
    }

    let tls = upgrade_to_tls(tcp, &link.hostname).await?;
    info!(%address, "connected with TLS");
    Ok(S2SStream::TlsClient(Box::new(tls)))
}

/// Verify the hub against the system roots.
async fn upgrade_to_tls(tcp: TcpStream, hostname: &str) -> io::Result<ClientTlsStream<TcpStream>> {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for cert in native.certs {
        if let Err(e) = roots.add(cert) {
            warn!(error = %e, "failed to add root cert");
        }
    }
    for e in &native.errors {
        warn!(error = %e, "error loading native certs");
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    connector.connect(server_name, tcp).await
}

impl AsyncRead for S2SStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            S2SStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            S2SStream::TlsClient(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for S2SStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            S2SStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            S2SStream::TlsClient(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            S2SStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            S2SStream::TlsClient(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            S2SStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            S2SStream::TlsClient(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}
