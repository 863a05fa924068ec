//! Fetch a URL once and report how long the connection and the request took.
//!
//! The interesting part lives in [`http::transport::InstrumentedTransport`], a
//! pooled HTTP/1.1 transport that stamps the dial and the round-trip of each
//! request it carries.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate tracing;

pub mod app;
pub mod cli;
pub mod http;
pub mod timing;
pub mod tls;
