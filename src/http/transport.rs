use crate::http::dns_logging_connector::DnsLoggingResolver;
use crate::http::error::TransportError;
use crate::http::proxy::{ProxyConnector, ProxySettings};
use crate::http::timing_connector::TimingConnector;
use crate::http::tls_connector::TlsConnector;
use crate::timing::{Phase, TimingRecorder, TransportTimings};
use crate::tls::config::TlsOptions;
use bytes::Bytes;
use http_body_util::Full;
use http::header::PROXY_AUTHORIZATION;
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::client::legacy::connect::{Connect, HttpConnector};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::Duration;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const TCP_KEEPALIVE: Duration = Duration::from_secs(30);
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connector stack, innermost first: TCP dial, timing, proxy, TLS.
pub type Connector =
    TlsConnector<ProxyConnector<TimingConnector<HttpConnector<DnsLoggingResolver>>>>;

/// Timeouts and proxy settings of an [`InstrumentedTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub keep_alive: Duration,
    pub tls_handshake_timeout: Duration,
    pub proxy: ProxySettings,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            keep_alive: TCP_KEEPALIVE,
            tls_handshake_timeout: TLS_HANDSHAKE_TIMEOUT,
            proxy: ProxySettings::from_env(),
        }
    }
}

/// An HTTP/1.1 transport that times the dial and the round-trip of each
/// request it carries.
///
/// The pooled client inside dials only when it has no idle connection to
/// reuse, so [`connection_duration`](Self::connection_duration) is zero for a
/// reused connection. The TLS handshake happens after the dial and is counted
/// in [`request_only_duration`](Self::request_only_duration).
///
/// One instance tracks one request at a time; `round_trip` takes `&mut self`
/// for that reason.
pub struct InstrumentedTransport<C = Connector> {
    client: Client<C, Full<Bytes>>,
    recorder: TimingRecorder,
    proxy: Arc<ProxySettings>,
}

impl InstrumentedTransport {
    /// Builds a transport with the fixed default timeouts and the proxy from
    /// the environment. Without `tls_config` certificates are verified against
    /// the built-in roots.
    pub fn new(tls_config: Option<ClientConfig>) -> Result<Self, anyhow::Error> {
        Self::with_config(tls_config, TransportConfig::default())
    }

    pub fn with_config(
        tls_config: Option<ClientConfig>,
        config: TransportConfig,
    ) -> Result<Self, anyhow::Error> {
        let mut tls_config = match tls_config {
            Some(tls_config) => tls_config,
            None => TlsOptions::default().build()?,
        };
        tls_config.alpn_protocols = vec![b"http/1.1".to_vec()];

        let recorder = TimingRecorder::new();

        let mut dialer = HttpConnector::new_with_resolver(DnsLoggingResolver::new());
        dialer.enforce_http(false);
        dialer.set_connect_timeout(Some(config.connect_timeout));
        dialer.set_keepalive(Some(config.keep_alive));
        dialer.set_nodelay(true);

        let proxy = Arc::new(config.proxy);
        let connector = TlsConnector::new(
            ProxyConnector::new(TimingConnector::new(dialer, recorder.clone()), proxy.clone()),
            Arc::new(tls_config),
            config.tls_handshake_timeout,
        );
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self::from_parts(client, recorder, proxy))
    }
}

impl<C> InstrumentedTransport<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    /// `client` must dial through a [`TimingConnector`] stamping `recorder`.
    pub(crate) fn from_parts(
        client: Client<C, Full<Bytes>>,
        recorder: TimingRecorder,
        proxy: Arc<ProxySettings>,
    ) -> Self {
        Self {
            client,
            recorder,
            proxy,
        }
    }

    /// Sends `request` and waits for the response head.
    ///
    /// `request_start` is stamped before the pooled client is invoked and
    /// `request_end` once it returns, fails, or is dropped.
    pub async fn round_trip(
        &mut self,
        mut request: Request<Full<Bytes>>,
    ) -> Result<Response<Incoming>, TransportError> {
        if let Some(auth) = self.proxy.forward_auth(request.uri()) {
            request
                .headers_mut()
                .entry(PROXY_AUTHORIZATION)
                .or_insert_with(|| auth.clone());
        }
        trace!("Start request {} {}", request.method(), request.uri());
        let phase = self.recorder.begin(Phase::Request);
        let result = self.client.request(request).await;
        drop(phase);
        trace!("{}", self.recorder.snapshot());
        result.map_err(TransportError::from)
    }

    /// Total round-trip time.
    pub fn duration(&self) -> Duration {
        self.recorder.snapshot().duration()
    }

    /// Time spent dialing a new connection; zero when one was reused.
    pub fn connection_duration(&self) -> Duration {
        self.recorder.snapshot().connection_duration()
    }

    /// [`duration`](Self::duration) minus [`connection_duration`](Self::connection_duration).
    pub fn request_only_duration(&self) -> Duration {
        self.recorder.snapshot().request_only_duration()
    }

    pub fn timings(&self) -> TransportTimings {
        self.recorder.snapshot()
    }
}
