use crate::timing::TransportTimings;
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::response::Parts;
use std::error::Error as StdError;
use tracing::dispatcher::{self, DefaultGuard, Dispatch};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// What the log record says about the response itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSummary {
    pub status: u16,
    pub content_length: Option<u64>,
    pub encoding: Vec<String>,
    pub body_size: usize,
}

impl ResponseSummary {
    pub fn new(parts: &Parts, body_size: usize) -> Self {
        let content_length = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        let encoding = parts
            .headers
            .get_all(TRANSFER_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .collect();
        Self {
            status: parts.status.as_u16(),
            content_length,
            encoding,
            body_size,
        }
    }

    /// `-1` when the length is unknown.
    fn content_length_field(&self) -> i64 {
        self.content_length
            .and_then(|n| i64::try_from(n).ok())
            .unwrap_or(-1)
    }
}

/// Emits the outcome of a fetch through its own subscriber rather than a
/// process-wide one.
pub struct Reporter {
    dispatch: Dispatch,
    quiet: bool,
}

impl Reporter {
    pub fn new(verbosity: u8, quiet: bool) -> Result<Self, anyhow::Error> {
        let log_level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        let mut filter = EnvFilter::builder()
            .with_default_directive(log_level.into())
            .from_env_lossy();
        if verbosity < 2 {
            filter = filter.add_directive("hyper_util=off".parse()?);
        }
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .finish();
        Ok(Self::with_dispatch(Dispatch::new(subscriber), quiet))
    }

    pub fn with_dispatch(dispatch: Dispatch, quiet: bool) -> Self {
        Self { dispatch, quiet }
    }

    /// Makes this reporter's subscriber the default for the current thread
    /// until the guard drops, so transport diagnostics land in the same place.
    pub fn install(&self) -> DefaultGuard {
        dispatcher::set_default(&self.dispatch)
    }

    pub fn success(&self, timings: &TransportTimings, response: &ResponseSummary) {
        if self.quiet {
            return;
        }
        dispatcher::with_default(&self.dispatch, || {
            debug!("{}", timings);
            info!(
                duration = ?timings.duration(),
                reqDuration = ?timings.request_only_duration(),
                connDuration = ?timings.connection_duration(),
                "content-length" = response.content_length_field(),
                status = response.status,
                encoding = ?response.encoding,
                "body-size" = response.body_size,
                "success"
            );
        });
    }

    pub fn unexpected_status(&self, timings: &TransportTimings, response: &ResponseSummary) {
        dispatcher::with_default(&self.dispatch, || {
            error!(
                duration = ?timings.duration(),
                reqDuration = ?timings.request_only_duration(),
                connDuration = ?timings.connection_duration(),
                "content-length" = response.content_length_field(),
                status = response.status,
                encoding = ?response.encoding,
                "body-size" = response.body_size,
                "non-200 status"
            );
        });
    }

    pub fn body_failed(
        &self,
        timings: &TransportTimings,
        response: &ResponseSummary,
        err: &(dyn StdError + 'static),
    ) {
        dispatcher::with_default(&self.dispatch, || {
            error!(
                error = %error_chain(err),
                duration = ?timings.duration(),
                reqDuration = ?timings.request_only_duration(),
                connDuration = ?timings.connection_duration(),
                "content-length" = response.content_length_field(),
                status = response.status,
                encoding = ?response.encoding,
                "body-size" = response.body_size,
                "error reading body"
            );
        });
    }

    /// The request never produced a response. The caller exits non-zero.
    pub fn request_failed(&self, timings: &TransportTimings, err: &(dyn StdError + 'static)) {
        dispatcher::with_default(&self.dispatch, || {
            error!(
                error = %error_chain(err),
                duration = ?timings.duration(),
                reqDuration = ?timings.request_only_duration(),
                connDuration = ?timings.connection_duration(),
                "GET error"
            );
        });
    }

    pub fn setup_failed(&self, err: &anyhow::Error) {
        let chain = format!("{:#}", err);
        dispatcher::with_default(&self.dispatch, || {
            error!(error = %chain, "setup error");
        });
    }
}

/// `outer: inner: root` the way anyhow prints an alternate chain.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
