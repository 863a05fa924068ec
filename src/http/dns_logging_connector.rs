use hyper_util::client::legacy::connect::dns::Name;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::vec;
use tower_service::Service;

/// System resolver that reports each lookup through tracing.
#[derive(Clone, Debug, Default)]
pub struct DnsLoggingResolver;

impl DnsLoggingResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Service<Name> for DnsLoggingResolver {
    type Response = vec::IntoIter<SocketAddr>;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, name: Name) -> Self::Future {
        Box::pin(async move {
            let host = name.as_str().to_string();
            let lookup = host.clone();

            debug!("Resolving DNS for: {}", host);

            let addrs = tokio::task::spawn_blocking(move || (lookup.as_str(), 0).to_socket_addrs())
                .await
                .map_err(io::Error::other)??;
            let addresses: Vec<SocketAddr> = addrs.collect();

            if addresses.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no IP addresses found for host {}", host),
                ));
            }

            for (i, addr) in addresses.iter().enumerate() {
                if i == 0 {
                    debug!("Resolved IP: {}", addr.ip());
                } else {
                    trace!("Resolved IP (alternative): {}", addr.ip());
                }
            }

            Ok(addresses.into_iter())
        })
    }
}
