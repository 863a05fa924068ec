// Instrumented dial: stamps the connection phase of the shared timing state
// around whatever connector it wraps. The pooled client only calls it when no
// idle connection can be reused.

use crate::timing::{Phase, TimingRecorder};
use futures::future::BoxFuture;
use hyper::Uri;
use std::task::{Context, Poll};
use tower_service::Service;

#[derive(Clone, Debug)]
pub struct TimingConnector<C> {
    inner: C,
    recorder: TimingRecorder,
}

impl<C> TimingConnector<C> {
    pub fn new(inner: C, recorder: TimingRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl<C> Service<Uri> for TimingConnector<C>
where
    C: Service<Uri>,
    C::Future: Send + 'static,
{
    type Response = C::Response;
    type Error = C::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        trace!("Dialing {}", dst);
        let phase = self.recorder.begin(Phase::Connection);
        let dialing = self.inner.call(dst.clone());
        Box::pin(async move {
            let result = dialing.await;
            drop(phase);
            match &result {
                Ok(_) => debug!("Connected to {}", dst),
                Err(_) => debug!("Dial to {} failed", dst),
            }
            result
        })
    }
}
