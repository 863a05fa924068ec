use crate::http::error::HandshakeError;
use futures::future::BoxFuture;
use hyper::rt::{Read, Write};
use hyper::Uri;
use hyper_rustls::MaybeHttpsStream;
use hyper_util::client::legacy::connect::Connection;
use hyper_util::rt::TokioIo;
use pki_types::ServerName;
use rustls::ClientConfig;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower_service::Service;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Runs the TLS handshake for `https` targets once the inner connector has
/// produced a stream. Handshake time therefore falls outside the dial.
#[derive(Clone)]
pub struct TlsConnector<C> {
    inner: C,
    tls: tokio_rustls::TlsConnector,
    handshake_timeout: Duration,
}

impl<C> TlsConnector<C> {
    pub fn new(inner: C, tls_config: Arc<ClientConfig>, handshake_timeout: Duration) -> Self {
        Self {
            inner,
            tls: tokio_rustls::TlsConnector::from(tls_config),
            handshake_timeout,
        }
    }
}

impl<C> Service<Uri> for TlsConnector<C>
where
    C: Service<Uri>,
    C::Response: Read + Write + Connection + Unpin + Send + 'static,
    C::Future: Send + 'static,
    C::Error: Into<BoxError>,
{
    type Response = MaybeHttpsStream<C::Response>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let is_https = dst.scheme_str() == Some("https");
        let server_name = server_name(&dst);
        let connecting = self.inner.call(dst);
        let tls = self.tls.clone();
        let handshake_timeout = self.handshake_timeout;

        Box::pin(async move {
            let io = connecting.await.map_err(Into::into)?;
            if !is_https {
                return Ok(MaybeHttpsStream::Http(io));
            }

            let (server_name, server) = server_name?;
            trace!("Starting TLS handshake with {}", server);
            let handshake = tls.connect(server_name, TokioIo::new(io));
            let stream = tokio::time::timeout(handshake_timeout, handshake)
                .await
                .map_err(|_| HandshakeError::TimedOut(handshake_timeout))?
                .map_err(|source| HandshakeError::Failed { server, source })?;

            let (_, session) = stream.get_ref();
            debug!(
                "TLS established: {:?} {:?}",
                session.protocol_version(),
                session.negotiated_cipher_suite().map(|suite| suite.suite())
            );
            Ok::<_, BoxError>(MaybeHttpsStream::Https(TokioIo::new(stream)))
        })
    }
}

fn server_name(dst: &Uri) -> Result<(ServerName<'static>, String), HandshakeError> {
    let host = dst
        .host()
        .unwrap_or_default()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    match ServerName::try_from(host.clone()) {
        Ok(name) => Ok((name, host)),
        Err(_) => Err(HandshakeError::InvalidServerName(host)),
    }
}
