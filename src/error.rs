use std::fmt;
use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by server construction, registration, and lifecycle calls.
///
/// I/O failures on a live connection are not reported through this type;
/// they terminate the affected session (see `server::session`).
#[derive(Debug)]
pub enum Error {
    /// Bad arguments, e.g. registering a `HEAD` handler or an empty path.
    Invalid(&'static str),
    /// A new handler overlaps an existing registration (same host and
    /// method, and one path is a prefix of the other).
    AddressInUse,
    /// The server URL has an unsupported scheme or an unresolvable host.
    InvalidAddress(String),
    /// A mutation was attempted while the server is running.
    Busy,
    /// The requested capability is not compiled in (TLS feature).
    NotSupported,
    /// The session or server shut down while the operation was in flight.
    Closed,
    /// An underlying socket or filesystem error.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Invalid(what) => write!(f, "invalid argument: {what}"),
            Error::AddressInUse => {
                write!(f, "handler registration conflicts with an existing handler")
            }
            Error::InvalidAddress(url) => write!(f, "invalid server address: {url}"),
            Error::Busy => write!(f, "server is running; stop it before reconfiguring"),
            Error::NotSupported => write!(f, "not supported by this build"),
            Error::Closed => write!(f, "connection or server closed"),
            Error::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
