use crate::http::error::{BodyReadError, TransportError};
use crate::http::transport::InstrumentedTransport;
use bytes::Bytes;
use futures::StreamExt;
use http::header::{HeaderValue, ACCEPT, LOCATION, USER_AGENT};
use http::StatusCode;
use http_body_util::{BodyExt, BodyStream, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, Uri};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use url::Url;

pub const MAX_REDIRECTS: usize = 10;

/// Bytes drained from a response body, and the error that stopped the read
/// early if there was one.
#[derive(Debug)]
pub struct BodySummary {
    pub size: usize,
    pub error: Option<BodyReadError>,
}

/// Single-shot GET client. The total timeout covers every redirect hop and
/// the body read that follows the last one.
pub struct HttpClient {
    transport: InstrumentedTransport,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl HttpClient {
    pub fn new(transport: InstrumentedTransport, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            deadline: None,
        }
    }

    pub fn transport(&self) -> &InstrumentedTransport {
        &self.transport
    }

    /// Fetches `uri`, following up to [`MAX_REDIRECTS`] redirects. The
    /// transport timings afterwards describe the last hop.
    pub async fn get(&mut self, uri: &Uri) -> Result<Response<Incoming>, TransportError> {
        let limit = self.timeout;
        let deadline = Instant::now() + limit;
        self.deadline = Some(deadline);
        timeout_at(deadline, self.follow_redirects(uri.clone()))
            .await
            .map_err(|_| TransportError::Timeout(limit))?
    }

    async fn follow_redirects(&mut self, mut uri: Uri) -> Result<Response<Incoming>, TransportError> {
        let mut redirects = 0;
        loop {
            let response = self.transport.round_trip(build_request(&uri)?).await?;
            if !is_redirect(response.status()) {
                return Ok(response);
            }
            // A redirect without a target is handed back as the final answer.
            let Some(location) = response.headers().get(LOCATION) else {
                return Ok(response);
            };
            if redirects == MAX_REDIRECTS {
                return Err(TransportError::TooManyRedirects(MAX_REDIRECTS));
            }
            let next = resolve_location(&uri, location)?;
            redirects += 1;
            debug!("Redirecting to: {} ({}/{})", next, redirects, MAX_REDIRECTS);

            // Drain so the connection can go back to the pool.
            let _ = response.into_body().collect().await;
            uri = next;
        }
    }

    /// Drains `body`, counting its bytes, within what is left of the deadline
    /// set by the last [`get`](Self::get).
    pub async fn read_body(&self, body: Incoming) -> BodySummary {
        let deadline = self
            .deadline
            .unwrap_or_else(|| Instant::now() + self.timeout);
        let mut size = 0;
        let mut body_stream = BodyStream::new(body);

        let drained = timeout_at(deadline, async {
            while let Some(frame) = body_stream.next().await {
                if let Ok(data) = frame?.into_data() {
                    size += data.len();
                }
            }
            Ok::<_, BodyReadError>(())
        })
        .await;

        let error = match drained {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => Some(BodyReadError::Timeout(self.timeout)),
        };
        BodySummary { size, error }
    }
}

fn build_request(uri: &Uri) -> Result<Request<Full<Bytes>>, TransportError> {
    let request = Request::builder()
        .method(http::Method::GET)
        .uri(uri.clone())
        .header(ACCEPT, HeaderValue::from_static("*/*"))
        .header(
            USER_AGENT,
            HeaderValue::from_static(concat!("rfetch/", env!("CARGO_PKG_VERSION"))),
        )
        .body(Full::new(Bytes::new()))?;
    Ok(request)
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Resolves a `Location` value against the URI that produced it.
fn resolve_location(base: &Uri, location: &HeaderValue) -> Result<Uri, TransportError> {
    let invalid =
        || TransportError::InvalidRedirect(String::from_utf8_lossy(location.as_bytes()).into_owned());

    let target = location.to_str().map_err(|_| invalid())?;
    let base = Url::parse(&base.to_string()).map_err(|_| invalid())?;
    let mut next = base.join(target).map_err(|_| invalid())?;
    if !matches!(next.scheme(), "http" | "https") {
        return Err(invalid());
    }
    next.set_fragment(None);
    next.as_str().parse().map_err(|_| invalid())
}
