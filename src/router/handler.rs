use http::Method;

use crate::dispatcher::{Dispatch, HandlerFn};

/// Opaque identifier returned by registration, used to remove the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub(crate) u64);

/// A route registration: method, path, optional virtual host, and the
/// callback that serves matched requests.
///
/// `HEAD` cannot be registered directly; the server derives it from `GET`
/// (same headers, no body). Paths are stored with trailing slashes
/// stripped, so `/foo/` and `/foo` are the same registration.
pub struct HandlerEntry {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) host: Option<String>,
    pub(crate) is_dir: bool,
    pub(crate) is_upgrader: bool,
    pub(crate) callback: HandlerFn,
}

impl HandlerEntry {
    /// Create an entry serving `method` requests for exactly `path`.
    pub fn new<F>(method: Method, path: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Dispatch) + Send + Sync + 'static,
    {
        Self {
            method,
            path: path.into(),
            host: None,
            is_dir: false,
            is_upgrader: false,
            callback: std::sync::Arc::new(callback),
        }
    }

    /// Restrict the entry to requests whose `Host` header names `host`.
    ///
    /// Matching ignores case, tolerates a port in the header, and treats a
    /// single trailing dot on either side as equivalent. Entries without a
    /// host match any request.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Treat the path as a directory prefix: `/static` also matches
    /// `/static/css/site.css`.
    pub fn directory(mut self) -> Self {
        self.is_dir = true;
        self
    }

    /// Mark the handler as a protocol upgrader, allowed to take the
    /// transport over instead of responding (e.g. a WebSocket handshake).
    pub fn upgrader(mut self) -> Self {
        self.is_upgrader = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn is_upgrader(&self) -> bool {
        self.is_upgrader
    }

    pub(crate) fn callback(&self) -> HandlerFn {
        self.callback.clone()
    }
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("host", &self.host)
            .field("is_dir", &self.is_dir)
            .field("is_upgrader", &self.is_upgrader)
            .finish_non_exhaustive()
    }
}
