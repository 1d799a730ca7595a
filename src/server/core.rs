use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use may::coroutine::{self, JoinHandle};
use may::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use super::session::Session;
use crate::error::{Error, Result};
use crate::http::Request;
use crate::router::{HandlerEntry, HandlerId, Registry, RouteLookup};
use crate::runtime_config::RuntimeConfig;
use crate::transport::HttpTransport;
#[cfg(feature = "tls")]
use crate::transport::TlsConfig;

/// Everything guarded by the server lock: the routing table, the live
/// session set, and the lifecycle flags. One lock keeps the invariants
/// simple; none of these sections do I/O while holding it.
struct ServerInner {
    registry: Registry,
    sessions: HashMap<u64, JoinHandle<()>>,
    closed: bool,
    starts: u32,
    accept: Option<JoinHandle<()>>,
    #[cfg(feature = "tls")]
    tls: Option<TlsConfig>,
}

/// An embeddable HTTP/1.x server bound to one host and port.
///
/// Obtained from [`open`](super::directory::open), which deduplicates
/// servers process-wide by address so independent components can hang
/// handlers off the same port. Starting and stopping are reference
/// counted the same way: the listener exists while at least one `start`
/// is outstanding, and the final `stop` aborts every live connection and
/// waits for their sessions to finish.
pub struct Server {
    hostname: String,
    port: String,
    addr: SocketAddr,
    needs_tls: bool,
    inner: Mutex<ServerInner>,
    next_session_id: AtomicU64,
    config: RuntimeConfig,
}

impl Server {
    /// Resolve the bind target and construct a stopped server.
    ///
    /// Resolution is synchronous, which is why callers are expected to use
    /// numeric addresses or names the resolver answers locally.
    pub(crate) fn bind_target(scheme: &str, hostname: &str, port: &str) -> Result<Self> {
        let port_num: u16 = port
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("{hostname}:{port}")))?;
        let addr = (hostname, port_num)
            .to_socket_addrs()
            .map_err(|_| Error::InvalidAddress(format!("{hostname}:{port}")))?
            .next()
            .ok_or_else(|| Error::InvalidAddress(format!("{hostname}:{port}")))?;
        Ok(Self {
            hostname: hostname.to_string(),
            port: port.to_string(),
            addr,
            needs_tls: matches!(scheme, "https" | "wss"),
            inner: Mutex::new(ServerInner {
                registry: Registry::new(),
                sessions: HashMap::new(),
                closed: false,
                starts: 0,
                accept: None,
                #[cfg(feature = "tls")]
                tls: None,
            }),
            next_session_id: AtomicU64::new(1),
            config: RuntimeConfig::from_env(),
        })
    }

    /// The hostname this server was opened with, before resolution.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The port this server was opened with, as it appeared in the URL.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// The resolved address this server binds.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start accepting connections. Reference counted: only the first
    /// start binds the listener, later ones just nest.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.starts == 0 {
            #[cfg(feature = "tls")]
            if self.needs_tls && inner.tls.is_none() {
                return Err(Error::Invalid("TLS scheme requires set_tls before start"));
            }
            #[cfg(not(feature = "tls"))]
            if self.needs_tls {
                return Err(Error::NotSupported);
            }
            let listener = TcpListener::bind(self.addr)?;
            let weak = Arc::downgrade(self);
            let handle = unsafe {
                coroutine::Builder::new()
                    .stack_size(self.config.stack_size)
                    .spawn(move || accept_loop(weak, listener))
            }?;
            inner.closed = false;
            inner.accept = Some(handle);
            info!(addr = %self.addr, "server listening");
        }
        inner.starts += 1;
        Ok(())
    }

    /// Undo one `start`. The final stop closes the listener, aborts every
    /// live connection, and blocks until all sessions have finished. No
    /// graceful drain: in-flight requests are cut off.
    pub fn stop(&self) {
        let (accept, sessions) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.starts == 0 {
                return;
            }
            inner.starts -= 1;
            if inner.starts > 0 {
                return;
            }
            inner.closed = true;
            (inner.accept.take(), std::mem::take(&mut inner.sessions))
        };
        self.teardown(accept, sessions);
        info!(addr = %self.addr, "server stopped");
    }

    /// Force-stop regardless of the start count; used when the directory
    /// drops its last reference to the server.
    pub(crate) fn shutdown(&self) {
        let (accept, sessions) = {
            let mut inner = self.inner.lock().unwrap();
            inner.starts = 0;
            inner.closed = true;
            (inner.accept.take(), std::mem::take(&mut inner.sessions))
        };
        self.teardown(accept, sessions);
    }

    /// Cancel the accept loop and every session coroutine, then wait for
    /// each to unwind. Runs without the server lock held so sessions can
    /// take it to remove themselves.
    fn teardown(&self, accept: Option<JoinHandle<()>>, sessions: HashMap<u64, JoinHandle<()>>) {
        if let Some(handle) = accept {
            unsafe { handle.coroutine().cancel() };
            let _ = handle.join();
        }
        let count = sessions.len();
        for (_, handle) in sessions {
            unsafe { handle.coroutine().cancel() };
            let _ = handle.join();
        }
        if count > 0 {
            debug!(sessions = count, "live sessions aborted");
        }
    }

    /// Register a handler. Fails with [`Error::AddressInUse`] when it
    /// overlaps an existing registration.
    pub fn add_handler(&self, entry: HandlerEntry) -> Result<HandlerId> {
        self.inner.lock().unwrap().registry.add(entry)
    }

    /// Remove a handler registration. Dispatches already in flight to it
    /// complete normally; the handler is destroyed when the last one does.
    pub fn remove_handler(&self, id: HandlerId) {
        let detached = self.inner.lock().unwrap().registry.remove(id);
        // Dropped outside the lock: this may run the handler's cleanup.
        drop(detached);
    }

    /// Install the TLS configuration used for new connections. Rejected
    /// with [`Error::Busy`] while the server is started.
    #[cfg(feature = "tls")]
    pub fn set_tls(&self, config: TlsConfig) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.starts > 0 {
            return Err(Error::Busy);
        }
        inner.tls = Some(config);
        Ok(())
    }

    /// The currently installed TLS configuration, if any.
    #[cfg(feature = "tls")]
    pub fn get_tls(&self) -> Option<TlsConfig> {
        self.inner.lock().unwrap().tls.clone()
    }

    /// Match a request against the routing table. The lock is released
    /// again before the caller dispatches.
    pub(crate) fn route(&self, req: &Request, path: &str) -> RouteLookup {
        self.inner.lock().unwrap().registry.lookup(req, path)
    }

    pub(crate) fn forget_session(&self, id: u64) {
        self.inner.lock().unwrap().sessions.remove(&id);
    }

    /// Wrap an accepted stream and spawn its session. Returns `false`
    /// once the server is closed, telling the accept loop to quit.
    fn register_session(self: &Arc<Self>, stream: TcpStream, peer: SocketAddr) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            // Late arrival during shutdown; the stream drops here.
            return false;
        }
        let Some(transport) = make_transport(&inner, stream, peer) else {
            // Wrapping failed; discard this connection, keep accepting.
            return true;
        };
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = Session::new(id, Arc::downgrade(self), transport);
        // Spawned while holding the lock so the session cannot finish and
        // try to remove itself before its handle is in the map.
        let spawned = unsafe {
            coroutine::Builder::new()
                .stack_size(self.config.stack_size)
                .spawn(move || session.run())
        };
        match spawned {
            Ok(handle) => {
                inner.sessions.insert(id, handle);
                debug!(session_id = id, peer = %peer, "connection accepted");
            }
            Err(e) => {
                error!(peer = %peer, error = %e, "failed to spawn session coroutine");
            }
        }
        true
    }
}

/// Wrap an accepted stream per the server's TLS configuration. `None`
/// discards the connection without killing the accept loop.
#[cfg_attr(not(feature = "tls"), allow(unused_variables))]
fn make_transport(
    inner: &ServerInner,
    stream: TcpStream,
    peer: SocketAddr,
) -> Option<HttpTransport> {
    #[cfg(feature = "tls")]
    if let Some(tls) = &inner.tls {
        return match HttpTransport::tls(tls, stream) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(peer = %peer, error = %e, "TLS transport setup failed");
                None
            }
        };
    }
    Some(HttpTransport::plain(stream))
}

/// One accept loop per started server. Errors are tolerated and retried;
/// the loop ends when the server closes (the cancel from `stop` unwinds
/// the blocking accept) or the server itself is gone.
fn accept_loop(server: Weak<Server>, listener: TcpListener) {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                let Some(server) = server.upgrade() else {
                    return;
                };
                if !server.register_session(stream, peer) {
                    return;
                }
            }
            Err(e) => {
                let Some(server) = server.upgrade() else {
                    return;
                };
                if server.inner.lock().unwrap().closed {
                    return;
                }
                warn!(error = %e, "accept failed, retrying");
            }
        }
    }
}
