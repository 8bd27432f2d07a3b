//! Binding one TCP listener per endpoint, with or without TLS, and producing
//! a uniform stream type [`connection`] can hand to `hyper-util`'s protocol
//! builder regardless of which kind it accepted (§4.10, §5).

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls_pemfile::{certs, pkcs8_private_keys};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::{rustls, TlsAcceptor};

use leafhttp_kernel::config::{Endpoint, HttpConfig, TlsConfig};

use crate::error::{ServerError, ServerResult};

/// Either a plain or a TLS-wrapped connection. `hyper-util`'s auto builder
/// only needs `AsyncRead + AsyncWrite + Unpin`, so this forwards to whichever
/// variant it holds rather than exposing the distinction further.
pub enum Stream {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::server::TlsStream<TcpStream>>),
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Stream::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Stream::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_flush(cx),
            Stream::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Stream::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// A bound listener for one declared endpoint, ready to `accept` connections
/// and upgrade them to TLS when the endpoint declared it.
pub struct Listener {
    pub endpoint: Endpoint,
    pub config: HttpConfig,
    tcp: TcpListener,
    tls: Option<TlsAcceptor>,
}

impl Listener {
    pub async fn bind(endpoint: Endpoint, config: HttpConfig) -> ServerResult<Self> {
        let addr = format!("{}:{}", endpoint.address, endpoint.port);
        let tcp = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::bind(&endpoint, e))?;
        let tls = match &config.tls {
            Some(tls_config) => Some(build_acceptor(&endpoint, tls_config)?),
            None => None,
        };
        Ok(Self {
            endpoint,
            config,
            tcp,
            tls,
        })
    }

    /// The address actually bound, which may differ from `self.endpoint`'s
    /// declared port when that port was `0` (tests bind an ephemeral port
    /// this way; real deployments always declare an explicit one).
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.tcp.local_addr()
    }

    pub async fn accept(&self) -> io::Result<Stream> {
        let (tcp_stream, _addr) = self.tcp.accept().await?;
        match &self.tls {
            None => Ok(Stream::Plain(tcp_stream)),
            Some(acceptor) => {
                let tls_stream = acceptor.accept(tcp_stream).await?;
                Ok(Stream::Tls(Box::new(tls_stream)))
            }
        }
    }
}

fn build_acceptor(endpoint: &Endpoint, tls_config: &TlsConfig) -> ServerResult<TlsAcceptor> {
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut &tls_config.cert_chain[..])
        .collect::<Result<_, _>>()
        .map_err(|e| ServerError::bind(endpoint, e))?;
    let mut keys: Vec<PrivateKeyDer<'static>> = pkcs8_private_keys(&mut &tls_config.private_key[..])
        .map(|r| r.map(PrivateKeyDer::Pkcs8))
        .collect::<Result<_, _>>()
        .map_err(|e| ServerError::bind(endpoint, e))?;
    let private_key = keys
        .pop()
        .ok_or_else(|| ServerError::Tls(endpoint.address.clone(), endpoint.port, rustls::Error::NoCertificatesPresented))?;

    let mut server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)
        .map_err(|e| ServerError::Tls(endpoint.address.clone(), endpoint.port, e))?;
    server_config.alpn_protocols = tls_config.alpn_protocols.clone();

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}
