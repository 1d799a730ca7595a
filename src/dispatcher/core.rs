use std::sync::Arc;

use may::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::ids::RequestId;
use crate::transport::HttpTransport;

/// A registered handler callback.
///
/// Invoked once per matched request with a [`Dispatch`] to complete. State
/// a handler needs lives in the closure's captures; its cleanup runs when
/// the last reference to the handler entry drops.
pub type HandlerFn = Arc<dyn Fn(Dispatch) + Send + Sync + 'static>;

/// What a handler produced, sent back to the waiting session.
pub(crate) struct Completion {
    pub(crate) result: Result<Option<Response>>,
    /// The transport travels inside the dispatch for upgrader handlers and
    /// comes back here unless the handler kept it.
    pub(crate) transport: Option<HttpTransport>,
}

/// One request handed to one handler, completed exactly once.
pub struct Dispatch {
    request: Request,
    request_id: RequestId,
    transport: Option<HttpTransport>,
    reply: Option<mpsc::Sender<Completion>>,
}

impl Dispatch {
    pub(crate) fn new(
        request: Request,
        request_id: RequestId,
        transport: Option<HttpTransport>,
        reply: mpsc::Sender<Completion>,
    ) -> Self {
        Self {
            request,
            request_id,
            transport,
            reply: Some(reply),
        }
    }

    /// The request being handled.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Identifier correlating this request across log lines.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Direct access to the connection, for upgrader handlers that want to
    /// write raw bytes while keeping the session alive. `None` unless the
    /// matched entry was registered as an upgrader.
    pub fn transport(&mut self) -> Option<&mut HttpTransport> {
        self.transport.as_mut()
    }

    /// Complete with a response for the session to write.
    pub fn respond(mut self, response: Response) {
        self.complete(Ok(Some(response)));
    }

    /// Complete with no response. The session reads the next request on
    /// the connection (or closes it, if it was already marked to close).
    pub fn finish(mut self) {
        self.complete(Ok(None));
    }

    /// Complete with a failure; the session closes the connection.
    pub fn fail(mut self, err: Error) {
        self.complete(Err(err));
    }

    /// Take ownership of the transport and detach from the session.
    ///
    /// The session ends without touching the connection; the caller now
    /// owns the byte pipe and the request that initiated the upgrade.
    /// Fails for handlers not registered as upgraders, in which case the
    /// dispatch is consumed as a failure and the session closes.
    pub fn into_upgrade(mut self) -> Result<(HttpTransport, Request)> {
        match self.transport.take() {
            Some(transport) => {
                let request = std::mem::take(&mut self.request);
                self.complete(Ok(None));
                Ok((transport, request))
            }
            None => {
                let id = self.request_id;
                self.complete(Err(Error::Invalid(
                    "handler is not registered as an upgrader",
                )));
                debug!(request_id = %id, "upgrade refused for non-upgrader handler");
                Err(Error::Invalid("handler is not registered as an upgrader"))
            }
        }
    }

    fn complete(&mut self, result: Result<Option<Response>>) {
        if let Some(reply) = self.reply.take() {
            // The session may already be gone (server stopped mid-flight);
            // a send failure is fine, the transport just drops here.
            let _ = reply.send(Completion {
                result,
                transport: self.transport.take(),
            });
        }
    }
}

impl Drop for Dispatch {
    fn drop(&mut self) {
        if self.reply.is_some() {
            debug!(request_id = %self.request_id, "dispatch dropped without completion");
            self.complete(Err(Error::Closed));
        }
    }
}
