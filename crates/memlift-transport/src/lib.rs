//! memlift-transport — minimal HTTP/1.1 JSON transport.
//!
//! Shared by the control-plane client and the platform notifier. Each
//! call opens its own connection:
//!
//! ```text
//! HttpClient::post(endpoint, headers, body)
//!   ├── TcpStream::connect(host, port)
//!   ├── [https] tokio_rustls::TlsConnector (webpki roots)
//!   ├── hyper http1 handshake → send_request
//!   └── collect body → HttpResponse { status, body }
//! ```
//!
//! A per-request timeout wraps the whole exchange.

pub mod client;
pub mod error;
pub mod tls;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::{Endpoint, HttpClient, HttpResponse};
pub use error::{TransportError, TransportResult};
