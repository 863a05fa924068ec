use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Timestamps captured around the dial and round-trip phases of a request.
///
/// `None` is the unset value. A pair with either side unset measures as zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimings {
    pub connection_start: Option<Instant>,
    pub connection_end: Option<Instant>,
    pub request_start: Option<Instant>,
    pub request_end: Option<Instant>,
}

impl TransportTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new round-trip. Connection stamps from an earlier dial are
    /// cleared so a reused connection measures as zero.
    pub fn start_request(&mut self) {
        *self = Self {
            request_start: Some(Instant::now()),
            ..Self::default()
        };
    }

    pub fn end_request(&mut self) {
        self.request_end = Some(Instant::now());
    }

    pub fn start_connection(&mut self) {
        self.connection_start = Some(Instant::now());
        self.connection_end = None;
    }

    pub fn end_connection(&mut self) {
        self.connection_end = Some(Instant::now());
    }

    pub fn duration(&self) -> Duration {
        elapsed(self.request_start, self.request_end)
    }

    pub fn connection_duration(&self) -> Duration {
        elapsed(self.connection_start, self.connection_end)
    }

    pub fn request_only_duration(&self) -> Duration {
        self.duration().saturating_sub(self.connection_duration())
    }
}

fn elapsed(start: Option<Instant>, end: Option<Instant>) -> Duration {
    match (start, end) {
        (Some(start), Some(end)) => end.saturating_duration_since(start),
        _ => Duration::ZERO,
    }
}

impl fmt::Display for TransportTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nTime breakdown:")?;

        if self.connection_start.is_some() {
            writeln!(
                f,
                "  Connect:         {:>8} ms",
                self.connection_duration().as_millis()
            )?;
        } else {
            writeln!(f, "  Connect:         reused")?;
        }

        if self.request_start.is_some() {
            writeln!(
                f,
                "  Request:         {:>8} ms",
                self.request_only_duration().as_millis()
            )?;
            writeln!(f, "  Total time:      {:>8} ms", self.duration().as_millis())?;
        } else {
            writeln!(f, "  Total time:      N/A")?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Phase {
    Connection,
    Request,
}

/// Shared handle through which the transport and its dialer stamp the same
/// timing state.
#[derive(Debug, Clone, Default)]
pub struct TimingRecorder {
    inner: Arc<Mutex<TransportTimings>>,
}

impl TimingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TransportTimings {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut TransportTimings)) {
        let mut timings = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut timings);
    }

    /// Stamps the start of `phase`. The returned guard stamps its end when
    /// dropped, so a cancelled future still closes the phase.
    pub(crate) fn begin(&self, phase: Phase) -> PhaseGuard {
        self.update(|t| match phase {
            Phase::Connection => t.start_connection(),
            Phase::Request => t.start_request(),
        });
        PhaseGuard {
            recorder: self.clone(),
            phase,
        }
    }
}

#[must_use = "the phase ends when the guard is dropped"]
pub(crate) struct PhaseGuard {
    recorder: TimingRecorder,
    phase: Phase,
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        let phase = self.phase;
        self.recorder.update(|t| match phase {
            Phase::Connection => t.end_connection(),
            Phase::Request => t.end_request(),
        });
    }
}
