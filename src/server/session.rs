use std::sync::Weak;

use http::{Method, StatusCode};
use may::sync::mpsc;
use tracing::{debug, warn};

use super::core::Server;
use crate::dispatcher::Dispatch;
use crate::http::{Request, Response};
use crate::ids::RequestId;
use crate::router::RouteLookup;
use crate::transport::{HttpTransport, ReadError};
use crate::uri;

/// What the session does after finishing one request.
enum Flow {
    /// Keep the connection and read the next request.
    Continue,
    /// Tear the connection down.
    Close,
    /// An upgrader took the transport; end the session without closing it.
    Upgraded,
}

/// Per-connection driver of the request/response cycle.
///
/// One session serves one accepted connection inside its own coroutine:
/// read a request, match it, dispatch it, write the response, and repeat
/// while the connection stays persistent. The back-reference to the server
/// is weak; the server owns sessions, never the other way around.
pub(crate) struct Session {
    id: u64,
    server: Weak<Server>,
    transport: Option<HttpTransport>,
    req: Request,
    /// Marked once the connection must not serve another request.
    close: bool,
}

/// Removes the session from the server's list when the coroutine ends,
/// whether it returned normally or was cancelled by `stop()`.
struct SessionGuard {
    id: u64,
    server: Weak<Server>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(server) = self.server.upgrade() {
            server.forget_session(self.id);
        }
    }
}

impl Session {
    pub(crate) fn new(id: u64, server: Weak<Server>, transport: HttpTransport) -> Self {
        Self {
            id,
            server,
            transport: Some(transport),
            req: Request::new(),
            close: false,
        }
    }

    /// Drive the session until the connection closes or is relinquished.
    pub(crate) fn run(mut self) {
        let _guard = SessionGuard {
            id: self.id,
            server: self.server.clone(),
        };
        loop {
            match self.serve_one() {
                Flow::Continue => {}
                Flow::Close => {
                    if let Some(t) = self.transport.as_mut() {
                        t.close();
                    }
                    debug!(session_id = self.id, "session closed");
                    return;
                }
                Flow::Upgraded => {
                    debug!(session_id = self.id, "transport relinquished to upgrader");
                    return;
                }
            }
        }
    }

    /// Read, match, dispatch, and answer a single request.
    fn serve_one(&mut self) -> Flow {
        let Some(transport) = self.transport.as_mut() else {
            return Flow::Close;
        };
        if let Err(err) = transport.read_request(&mut self.req) {
            return match err {
                ReadError::Closed => Flow::Close,
                ReadError::Io(e) => {
                    debug!(session_id = self.id, error = %e, "request read failed");
                    Flow::Close
                }
                ReadError::TooLarge | ReadError::Malformed => {
                    self.close = true;
                    self.send_error(StatusCode::BAD_REQUEST)
                }
                ReadError::Version(v) => {
                    // A real HTTP/2+ request we understand enough to
                    // refuse properly; HTTP/0.x and garbage tokens are
                    // plain bad requests.
                    self.close = true;
                    if version_not_supported(&v) {
                        self.send_error(StatusCode::HTTP_VERSION_NOT_SUPPORTED)
                    } else {
                        self.send_error(StatusCode::BAD_REQUEST)
                    }
                }
            };
        }

        let request_id = RequestId::new();
        debug!(
            session_id = self.id,
            request_id = %request_id,
            method = %self.req.method(),
            uri = self.req.uri(),
            version = self.req.version(),
            "request received"
        );

        // HTTP/1.0 gets no keep-alive; nobody standardized it back then.
        if self.req.version() != "HTTP/1.1" {
            self.close = true;
        }
        if let Some(conn) = self.req.header("Connection") {
            if has_close_token(conn) {
                self.close = true;
            }
        }

        let path = uri::canonify(self.req.uri());

        let Some(server) = self.server.upgrade() else {
            return Flow::Close;
        };
        // The registry lock is released before the callback runs; handlers
        // may mutate the registry themselves.
        let entry = match server.route(&self.req, &path) {
            RouteLookup::Found(entry) => entry,
            RouteLookup::NotFound => return self.send_error(StatusCode::NOT_FOUND),
            RouteLookup::MethodNotAllowed => {
                return self.send_error(StatusCode::METHOD_NOT_ALLOWED)
            }
        };
        drop(server);

        let upgrader = entry.is_upgrader();
        let (reply_tx, reply_rx) = mpsc::channel();
        let dispatch = Dispatch::new(
            self.req.clone(),
            request_id,
            if upgrader { self.transport.take() } else { None },
            reply_tx,
        );
        let callback = entry.callback();
        callback(dispatch);

        // `entry` stays alive across the wait: an in-flight dispatch keeps
        // its handler even if it is removed from the registry meanwhile.
        let completion = match reply_rx.recv() {
            Ok(c) => c,
            Err(_) => return Flow::Close,
        };
        drop(entry);

        if let Some(returned) = completion.transport {
            self.transport = Some(returned);
        }

        match completion.result {
            Err(e) => {
                warn!(
                    session_id = self.id,
                    request_id = %request_id,
                    error = %e,
                    "handler failed"
                );
                Flow::Close
            }
            Ok(None) => {
                if upgrader && self.transport.is_none() {
                    return Flow::Upgraded;
                }
                // The handler answered on its own (or chose not to); keep
                // the connection unless something marked it closed.
                if self.close {
                    Flow::Close
                } else {
                    Flow::Continue
                }
            }
            Ok(Some(mut res)) => {
                if let Some(conn) = res.header("Connection") {
                    if has_close_token(conn) {
                        self.close = true;
                    }
                }
                if self.close {
                    res.set_header("Connection", "close");
                }
                self.write_response(&res)
            }
        }
    }

    /// Write the response head and body, honoring HEAD semantics.
    fn write_response(&mut self, res: &Response) -> Flow {
        let head_only = *self.req.method() == Method::HEAD;
        let Some(transport) = self.transport.as_mut() else {
            return Flow::Close;
        };
        if let Err(e) = transport.write_response(res) {
            debug!(session_id = self.id, error = %e, "response head write failed");
            return Flow::Close;
        }
        // HEAD responses carry the same headers as GET but no body bytes.
        let body = res.data();
        if !head_only && !body.is_empty() {
            if let Err(e) = transport.write_full(body) {
                debug!(session_id = self.id, error = %e, "response body write failed");
                return Flow::Close;
            }
        }
        debug!(
            session_id = self.id,
            status = res.status().as_u16(),
            body_bytes = if head_only { 0 } else { body.len() },
            "response written"
        );
        if self.close {
            Flow::Close
        } else {
            Flow::Continue
        }
    }

    /// Answer with a canned error response on the same write path as
    /// ordinary responses, then continue or close per the `close` mark.
    fn send_error(&mut self, status: StatusCode) -> Flow {
        let mut res = Response::error(status);
        if self.close {
            res.set_header("Connection", "close");
        }
        self.write_response(&res)
    }
}

/// Case-insensitive substring check for `close` in a Connection header.
/// A multi-token value such as `keep-alive, close` still closes.
fn has_close_token(value: &str) -> bool {
    value.to_ascii_lowercase().contains("close")
}

/// True only for a well-formed `HTTP/<major>.<minor>` token with a major
/// of 2 or higher. HTTP/1.x never reaches this check (the transport
/// serves every 1.x minor); anything else is answered 400, not 505.
fn version_not_supported(version: &str) -> bool {
    let Some(rest) = version.strip_prefix("HTTP/") else {
        return false;
    };
    let Some((major, minor)) = rest.split_once('.') else {
        return false;
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(major) && all_digits(minor) && major.parse::<u32>().is_ok_and(|m| m >= 2)
}
