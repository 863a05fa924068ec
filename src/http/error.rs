use std::error::Error as StdError;
use std::io;
use std::time::Duration;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Why a round-trip failed.
///
/// The transport only classifies failures, it never retries or rewrites them.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// DNS resolution, connection refused, connect timeout, proxy dial.
    #[error("dial failed")]
    Dial(#[source] BoxError),
    /// Handshake failure, certificate rejection, handshake timeout.
    #[error("tls handshake failed")]
    Tls(#[source] BoxError),
    /// Anything else that broke the exchange on an established connection.
    #[error("round trip failed")]
    Transport(#[source] BoxError),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("stopped after {0} redirects")]
    TooManyRedirects(usize),
    #[error("invalid redirect location {0:?}")]
    InvalidRedirect(String),
    #[error("invalid request")]
    InvalidRequest(#[from] http::Error),
}

impl TransportError {
    /// True when some layer gave up waiting: connect timeout, handshake
    /// timeout, or the client's total deadline.
    pub fn is_timeout(&self) -> bool {
        if matches!(self, TransportError::Timeout(_)) {
            return true;
        }
        sources(self).any(|err| {
            if let Some(io) = err.downcast_ref::<io::Error>() {
                io.kind() == io::ErrorKind::TimedOut
            } else {
                matches!(
                    err.downcast_ref::<HandshakeError>(),
                    Some(HandshakeError::TimedOut(_))
                )
            }
        })
    }

    pub fn is_dial(&self) -> bool {
        matches!(self, TransportError::Dial(_))
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, TransportError::Tls(_))
    }
}

impl From<hyper_util::client::legacy::Error> for TransportError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        let is_connect = err.is_connect();
        let tls = caused_by::<HandshakeError>(&err).is_some();
        classify(Box::new(err), is_connect, tls)
    }
}

fn classify(err: BoxError, is_connect: bool, tls: bool) -> TransportError {
    if tls {
        TransportError::Tls(err)
    } else if is_connect {
        TransportError::Dial(err)
    } else {
        TransportError::Transport(err)
    }
}

/// TLS failures raised by the connector stack.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("tls handshake with {server} failed")]
    Failed {
        server: String,
        #[source]
        source: io::Error,
    },
    #[error("tls handshake timed out after {0:?}")]
    TimedOut(Duration),
    #[error("invalid tls server name {0:?}")]
    InvalidServerName(String),
}

/// Failure while draining a response body. Timing data captured before it
/// stays valid.
#[derive(Debug, thiserror::Error)]
pub enum BodyReadError {
    #[error("reading body failed")]
    Read(#[from] hyper::Error),
    #[error("reading body timed out after {0:?}")]
    Timeout(Duration),
}

fn sources<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    let mut next = Some(err);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.source();
        Some(current)
    })
}

fn caused_by<'a, T: StdError + 'static>(err: &'a (dyn StdError + 'static)) -> Option<&'a T> {
    sources(err).find_map(|err| err.downcast_ref::<T>())
}
