//! Built-in handlers serving filesystem files and in-memory blobs.
//!
//! These are ordinary registrations through the same registry as user
//! handlers; they exist because nearly every embedding wants to expose a
//! favicon, a status page, or a directory of assets without writing the
//! handler by hand.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use http::{Method, StatusCode};
use tracing::debug;

use super::core::Server;
use crate::dispatcher::Dispatch;
use crate::error::Result;
use crate::http::Response;
use crate::mime;
use crate::router::{HandlerEntry, HandlerId};

impl Server {
    /// Serve the file at `fs_path` for `GET uri`.
    ///
    /// The file is read per request, so its content may change between
    /// requests without re-registration. A missing file answers 404, a
    /// permission failure 403, anything else 500. The content type comes
    /// from `content_type`, or from the file extension when `None`.
    pub fn add_file(
        &self,
        host: Option<&str>,
        content_type: Option<&str>,
        uri: &str,
        fs_path: impl Into<PathBuf>,
    ) -> Result<HandlerId> {
        let path: PathBuf = fs_path.into();
        let ctype: Option<String> = content_type
            .map(str::to_string)
            .or_else(|| {
                path.to_str()
                    .and_then(mime::lookup_content_type)
                    .map(str::to_string)
            });
        let entry = HandlerEntry::new(Method::GET, uri, move |dispatch: Dispatch| {
            let res = match std::fs::read(&path) {
                Ok(data) => {
                    let mut res = Response::new();
                    if let Some(ct) = &ctype {
                        res.set_header("Content-Type", ct);
                    }
                    res.set_data(data);
                    res
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "file handler read failed");
                    Response::error(file_error_status(e.kind()))
                }
            };
            dispatch.respond(res);
        });
        self.add_handler(apply_host(entry, host))
    }

    /// Serve a fixed byte blob for `GET uri`.
    ///
    /// The bytes are copied once at registration. The content type
    /// defaults to `application/octet-stream`.
    pub fn add_static(
        &self,
        host: Option<&str>,
        content_type: Option<&str>,
        uri: &str,
        data: &[u8],
    ) -> Result<HandlerId> {
        let ctype = content_type
            .unwrap_or("application/octet-stream")
            .to_string();
        let body: Arc<[u8]> = Arc::from(data);
        let entry = HandlerEntry::new(Method::GET, uri, move |dispatch: Dispatch| {
            let mut res = Response::new();
            res.set_header("Content-Type", &ctype);
            res.set_data(body.to_vec());
            dispatch.respond(res);
        });
        self.add_handler(apply_host(entry, host))
    }
}

fn apply_host(entry: HandlerEntry, host: Option<&str>) -> HandlerEntry {
    match host {
        Some(h) => entry.with_host(h),
        None => entry,
    }
}

/// Map a filesystem failure onto the client-facing status.
fn file_error_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
