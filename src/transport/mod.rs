//! # Transport Module
//!
//! HTTP/1.x framing over a byte pipe.
//!
//! [`HttpTransport`] owns the connection for the lifetime of a session: it
//! reads request heads off the wire into a reusable [`Request`], and writes
//! response heads and bodies back. The underlying pipe is either a plain
//! TCP stream or a TLS stream (feature `tls`); framing is identical for
//! both.
//!
//! A transport survives its session when a protocol-upgrade handler takes
//! it over; it implements `io::Read` and `io::Write` so the new owner can
//! keep speaking raw bytes, with any bytes the framer had already buffered
//! delivered first.

mod framing;
#[cfg(feature = "tls")]
mod tls;

pub use framing::{HttpTransport, ReadError, MAX_HEAD_BYTES};
#[cfg(feature = "tls")]
pub use tls::TlsConfig;
