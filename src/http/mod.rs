pub mod client;
pub mod dns_logging_connector;
pub mod error;
pub mod proxy;
pub mod timing_connector;
pub mod tls_connector;
pub mod transport;
