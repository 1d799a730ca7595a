use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use tracing::{debug, info};
use url::Url;

use super::core::Server;
use crate::error::{Error, Result};

/// Process-wide list of live servers, keyed by hostname and port.
///
/// Two components opening `http://127.0.0.1:8080/` get the same server,
/// so both can register handlers on one listener. Entries carry their own
/// open count; the server is destroyed when the last opener closes it.
static DIRECTORY: Lazy<Mutex<Vec<DirectoryEntry>>> = Lazy::new(|| Mutex::new(Vec::new()));

struct DirectoryEntry {
    hostname: String,
    port: String,
    opens: usize,
    server: Arc<Server>,
}

/// Open (or share) the server for a URL.
///
/// Supported schemes are `http` and `ws`, plus `https` and `wss` when the
/// `tls` feature is enabled. Only the hostname and port of the URL matter;
/// they are compared as strings against existing entries, so spell the
/// address the same way everywhere. The hostname is resolved synchronously
/// here: prefer numeric addresses or locally answerable names.
pub fn open(url_str: &str) -> Result<Arc<Server>> {
    let url = Url::parse(url_str).map_err(|_| Error::InvalidAddress(url_str.to_string()))?;
    let tls_schemes: &[&str] = if cfg!(feature = "tls") {
        &["https", "wss"]
    } else {
        &[]
    };
    let scheme = url.scheme();
    if !matches!(scheme, "http" | "ws") && !tls_schemes.contains(&scheme) {
        return Err(Error::InvalidAddress(url_str.to_string()));
    }
    let hostname = url
        .host_str()
        .ok_or_else(|| Error::InvalidAddress(url_str.to_string()))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| Error::InvalidAddress(url_str.to_string()))?
        .to_string();

    let mut dir = DIRECTORY.lock().unwrap();
    if let Some(entry) = dir
        .iter_mut()
        .find(|e| e.hostname == hostname && e.port == port)
    {
        entry.opens += 1;
        debug!(
            hostname = %entry.hostname,
            port = %entry.port,
            opens = entry.opens,
            "reusing existing server"
        );
        return Ok(entry.server.clone());
    }

    let server = Arc::new(Server::bind_target(scheme, &hostname, &port)?);
    info!(hostname = %hostname, port = %port, addr = %server.addr(), "server created");
    dir.push(DirectoryEntry {
        hostname,
        port,
        opens: 1,
        server: server.clone(),
    });
    Ok(server)
}

/// Release one open of a server.
///
/// When the last open is released, the entry leaves the directory and the
/// server is shut down outright, aborting any sessions still running.
pub fn close(server: &Arc<Server>) {
    let removed = {
        let mut dir = DIRECTORY.lock().unwrap();
        let Some(pos) = dir.iter().position(|e| Arc::ptr_eq(&e.server, server)) else {
            return;
        };
        dir[pos].opens -= 1;
        if dir[pos].opens > 0 {
            return;
        }
        dir.remove(pos)
    };
    info!(
        hostname = %removed.hostname,
        port = %removed.port,
        "server released"
    );
    // Shut down outside the directory lock; teardown joins sessions.
    removed.server.shutdown();
}
