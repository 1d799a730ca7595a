use std::sync::Arc;

use http::Method;
use tracing::{debug, info};

use super::{HandlerEntry, HandlerId};
use crate::error::{Error, Result};
use crate::http::Request;

/// Result of matching a request against the registry.
#[derive(Debug)]
pub enum RouteLookup {
    Found(Arc<HandlerEntry>),
    /// No entry matched the path (and host, where restricted).
    NotFound,
    /// At least one entry matched path and host but none matched the
    /// method: answer 405 rather than 404.
    MethodNotAllowed,
}

/// The routing table for one server.
///
/// A plain ordered list scanned linearly. Registrations are validated for
/// overlap at insertion, so at most one entry can match any request and
/// list order never decides the winner.
pub struct Registry {
    entries: Vec<(HandlerId, Arc<HandlerEntry>)>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a handler.
    ///
    /// Trailing slashes are stripped from the path before insertion. Fails
    /// with [`Error::Invalid`] for `HEAD` registrations or an empty path,
    /// and [`Error::AddressInUse`] when the new entry overlaps an existing
    /// one: same host (a host-less entry overlaps every host), same
    /// method, and either path a prefix of the other.
    pub fn add(&mut self, mut entry: HandlerEntry) -> Result<HandlerId> {
        if entry.method == Method::HEAD {
            return Err(Error::Invalid("HEAD handlers are derived from GET"));
        }
        if entry.path.is_empty() {
            return Err(Error::Invalid("handler path must not be empty"));
        }
        while entry.path.ends_with('/') {
            entry.path.pop();
        }
        for (_, existing) in &self.entries {
            if conflicts(existing, &entry) {
                debug!(
                    method = %entry.method,
                    path = %entry.path,
                    conflicting_path = %existing.path,
                    "handler registration rejected"
                );
                return Err(Error::AddressInUse);
            }
        }
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        info!(
            method = %entry.method,
            path = %entry.path,
            host = entry.host.as_deref().unwrap_or("*"),
            is_dir = entry.is_dir,
            is_upgrader = entry.is_upgrader,
            total_handlers = self.entries.len() + 1,
            "handler registered"
        );
        self.entries.push((id, Arc::new(entry)));
        Ok(id)
    }

    /// Remove a registration.
    ///
    /// Returns the detached entry, which stays alive until every in-flight
    /// dispatch referencing it completes.
    pub fn remove(&mut self, id: HandlerId) -> Option<Arc<HandlerEntry>> {
        let pos = self.entries.iter().position(|(eid, _)| *eid == id)?;
        let (_, entry) = self.entries.remove(pos);
        info!(
            method = %entry.method,
            path = %entry.path,
            total_handlers = self.entries.len(),
            "handler removed"
        );
        Some(entry)
    }

    /// Match a request (with its canonicalized path) against the table.
    pub fn lookup(&self, req: &Request, path: &str) -> RouteLookup {
        let mut method_mismatch = false;
        for (_, entry) in &self.entries {
            if let Some(entry_host) = &entry.host {
                // Virtual hosting insists on a Host header.
                let Some(req_host) = req.header("Host") else {
                    continue;
                };
                if !host_matches(entry_host, req_host) {
                    continue;
                }
            }
            if !path_matches(entry, path) {
                continue;
            }
            if method_matches(req.method(), &entry.method) {
                return RouteLookup::Found(entry.clone());
            }
            method_mismatch = true;
        }
        if method_mismatch {
            RouteLookup::MethodNotAllowed
        } else {
            RouteLookup::NotFound
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Two entries conflict when a request could plausibly reach either: hosts
/// overlap (a host-less entry is a wildcard), methods are identical, and
/// one path is a prefix of the other. Note the prefix rule is stricter
/// than URL semantics: `/foo` and `/foobar` conflict.
fn conflicts(a: &HandlerEntry, b: &HandlerEntry) -> bool {
    if let (Some(ha), Some(hb)) = (&a.host, &b.host) {
        if !ha.eq_ignore_ascii_case(hb) {
            return false;
        }
    }
    if a.method != b.method {
        return false;
    }
    let n = a.path.len().min(b.path.len());
    a.path.as_bytes()[..n] == b.path.as_bytes()[..n]
}

/// Match a Host header against an entry host: case-insensitive, the header
/// may carry a port, and a lone trailing dot on either side is ignored.
fn host_matches(entry_host: &str, req_host: &str) -> bool {
    let entry_host = entry_host.strip_suffix('.').unwrap_or(entry_host);
    let len = entry_host.len();
    let Some(head) = req_host.get(..len) else {
        return false;
    };
    if !head.eq_ignore_ascii_case(entry_host) {
        return false;
    }
    let rest = &req_host[len..];
    rest.is_empty() || rest.starts_with(':') || rest == "."
}

/// The entry path must be a prefix of the request path, and the next byte
/// must end the path. A dangling `/` is tolerated; anything beyond it
/// requires a directory entry.
fn path_matches(entry: &HandlerEntry, path: &str) -> bool {
    let ep = entry.path.as_bytes();
    let p = path.as_bytes();
    if p.len() < ep.len() || &p[..ep.len()] != ep {
        return false;
    }
    match p.get(ep.len()) {
        None => true,
        Some(b'/') => p.len() == ep.len() + 1 || entry.is_dir,
        Some(_) => false,
    }
}

/// HEAD requests are served by GET handlers.
fn method_matches(req_method: &Method, entry_method: &Method) -> bool {
    req_method == entry_method || (*req_method == Method::HEAD && *entry_method == Method::GET)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(method: Method, path: &str) -> HandlerEntry {
        HandlerEntry::new(method, path, |d| d.finish())
    }

    fn request(method: Method, host: Option<&str>) -> Request {
        let mut req = Request::new();
        req.set_method(method);
        if let Some(h) = host {
            req.add_header("Host", h);
        }
        req
    }

    #[test]
    fn test_add_rejects_head() {
        let mut reg = Registry::new();
        assert!(matches!(
            reg.add(entry(Method::HEAD, "/x")),
            Err(Error::Invalid(_))
        ));
    }

    #[test]
    fn test_add_rejects_empty_path() {
        let mut reg = Registry::new();
        assert!(matches!(
            reg.add(entry(Method::GET, "")),
            Err(Error::Invalid(_))
        ));
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let mut reg = Registry::new();
        reg.add(entry(Method::GET, "/foo/")).unwrap();
        let req = request(Method::GET, None);
        assert!(matches!(reg.lookup(&req, "/foo"), RouteLookup::Found(_)));
        assert!(matches!(reg.lookup(&req, "/foo/"), RouteLookup::Found(_)));
        assert!(matches!(
            reg.lookup(&req, "/foo/bar"),
            RouteLookup::NotFound
        ));
    }

    #[test]
    fn test_prefix_conflict() {
        let mut reg = Registry::new();
        reg.add(entry(Method::GET, "/foo")).unwrap();
        assert!(matches!(
            reg.add(entry(Method::GET, "/foobar")),
            Err(Error::AddressInUse)
        ));
        assert!(matches!(
            reg.add(entry(Method::GET, "/foo/bar")),
            Err(Error::AddressInUse)
        ));
        // Different method, same path: no conflict.
        reg.add(entry(Method::POST, "/foo")).unwrap();
    }

    #[test]
    fn test_host_wildcard_conflict() {
        let mut reg = Registry::new();
        reg.add(entry(Method::GET, "/a").with_host("x.example.com"))
            .unwrap();
        // Host-less entry overlaps every host.
        assert!(matches!(
            reg.add(entry(Method::GET, "/a")),
            Err(Error::AddressInUse)
        ));
        // A different host is fine.
        reg.add(entry(Method::GET, "/a").with_host("y.example.com"))
            .unwrap();
    }

    #[test]
    fn test_remove_restores_registry() {
        let mut reg = Registry::new();
        let id = reg.add(entry(Method::GET, "/foo")).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.remove(id).is_some());
        assert!(reg.is_empty());
        assert!(reg.remove(id).is_none());
        // The slot is genuinely free again.
        reg.add(entry(Method::GET, "/foo")).unwrap();
    }

    #[test]
    fn test_lookup_method_not_allowed() {
        let mut reg = Registry::new();
        reg.add(entry(Method::POST, "/x")).unwrap();
        let req = request(Method::GET, None);
        assert!(matches!(
            reg.lookup(&req, "/x"),
            RouteLookup::MethodNotAllowed
        ));
        assert!(matches!(reg.lookup(&req, "/y"), RouteLookup::NotFound));
    }

    #[test]
    fn test_head_maps_to_get() {
        let mut reg = Registry::new();
        reg.add(entry(Method::GET, "/x")).unwrap();
        let req = request(Method::HEAD, None);
        assert!(matches!(reg.lookup(&req, "/x"), RouteLookup::Found(_)));
    }

    #[test]
    fn test_directory_entry_matches_subpaths() {
        let mut reg = Registry::new();
        reg.add(entry(Method::GET, "/static").directory()).unwrap();
        let req = request(Method::GET, None);
        assert!(matches!(reg.lookup(&req, "/static"), RouteLookup::Found(_)));
        assert!(matches!(
            reg.lookup(&req, "/static/css/site.css"),
            RouteLookup::Found(_)
        ));
        assert!(matches!(
            reg.lookup(&req, "/staticfile"),
            RouteLookup::NotFound
        ));
    }

    #[test]
    fn test_host_matching_forms() {
        let mut reg = Registry::new();
        reg.add(entry(Method::GET, "/h").with_host("example.com."))
            .unwrap();
        for host in ["example.com", "EXAMPLE.COM:8080", "example.com."] {
            let req = request(Method::GET, Some(host));
            assert!(
                matches!(reg.lookup(&req, "/h"), RouteLookup::Found(_)),
                "host {host} should match"
            );
        }
        for host in ["example.org", "example.company", "wexample.com"] {
            let req = request(Method::GET, Some(host));
            assert!(
                matches!(reg.lookup(&req, "/h"), RouteLookup::NotFound),
                "host {host} should not match"
            );
        }
        // Virtual hosting requires the header outright.
        let req = request(Method::GET, None);
        assert!(matches!(reg.lookup(&req, "/h"), RouteLookup::NotFound));
    }

    #[test]
    fn test_refcount_survives_removal() {
        let mut reg = Registry::new();
        let id = reg.add(entry(Method::GET, "/x")).unwrap();
        let req = request(Method::GET, None);
        let RouteLookup::Found(in_flight) = reg.lookup(&req, "/x") else {
            panic!("expected a match");
        };
        let removed = reg.remove(id).unwrap();
        // Registry reference plus our dispatch reference.
        assert!(Arc::strong_count(&removed) >= 2);
        drop(removed);
        assert_eq!(in_flight.path(), "/x");
    }
}
