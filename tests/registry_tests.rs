//! Tests for registry invariants exercised through the public API:
//! conflict detection across registration sets, removal while dispatches
//! are in flight, and live registry mutation on a running server.

mod common;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::Method;
use may_httpd::{Error, HandlerEntry, Registry, Response, RouteLookup, Server};

use common::http::{free_port, wait_ready, Client};
use common::test_server::setup;

fn noop(path: &str) -> HandlerEntry {
    HandlerEntry::new(Method::GET, path, |d| d.finish())
}

#[test]
fn test_accepted_set_is_pairwise_conflict_free() {
    // Whatever subset of a messy registration batch the registry accepts,
    // no two surviving entries may overlap under the conflict rule.
    let candidates = [
        ("GET", "/a"),
        ("GET", "/a/b"),
        ("GET", "/ab"),
        ("POST", "/a"),
        ("GET", "/b/"),
        ("GET", "/b"),
        ("PUT", "/a/b/c"),
        ("GET", "/c"),
    ];
    let mut reg = Registry::new();
    let mut accepted = Vec::new();
    for (method, path) in candidates {
        let entry = HandlerEntry::new(method.parse::<Method>().unwrap(), path, |d| d.finish());
        match reg.add(entry) {
            Ok(_) => accepted.push((method, path.trim_end_matches('/'))),
            Err(Error::AddressInUse) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    for (i, (m1, p1)) in accepted.iter().enumerate() {
        for (m2, p2) in accepted.iter().skip(i + 1) {
            if m1 != m2 {
                continue;
            }
            let n = p1.len().min(p2.len());
            assert_ne!(
                &p1[..n],
                &p2[..n],
                "conflicting pair slipped through: {m1} {p1} vs {m2} {p2}"
            );
        }
    }
}

#[test]
fn test_add_then_remove_round_trips() {
    let mut reg = Registry::new();
    let mut req = may_httpd::Request::new();
    req.set_method(Method::GET);

    let id = reg.add(noop("/tmp")).unwrap();
    assert!(matches!(reg.lookup(&req, "/tmp"), RouteLookup::Found(_)));

    reg.remove(id);
    assert!(reg.is_empty());
    assert!(matches!(reg.lookup(&req, "/tmp"), RouteLookup::NotFound));

    // The registry is back to its prior state: the same registration
    // succeeds again and a conflicting one still fails afterwards.
    reg.add(noop("/tmp")).unwrap();
    assert!(matches!(reg.add(noop("/tmp/x")), Err(Error::AddressInUse)));
}

fn open_started(port: u16) -> (Arc<Server>, SocketAddr) {
    let server = may_httpd::open(&format!("http://127.0.0.1:{port}")).unwrap();
    (server, format!("127.0.0.1:{port}").parse().unwrap())
}

#[test]
fn test_server_rejects_conflicts_and_recovers_after_removal() {
    setup();
    let port = free_port();
    let (server, addr) = open_started(port);

    let id = server
        .add_handler(HandlerEntry::new(Method::GET, "/r", |d| {
            let mut res = Response::new();
            res.set_data(b"one".to_vec());
            d.respond(res);
        }))
        .unwrap();
    assert!(matches!(
        server.add_handler(noop("/r")),
        Err(Error::AddressInUse)
    ));

    server.start().unwrap();
    wait_ready(addr);

    let mut client = Client::connect(addr);
    assert_eq!(
        client.request("GET /r HTTP/1.1\r\nHost: x\r\n\r\n").body_str(),
        "one"
    );

    // Swap the handler while the server is live.
    server.remove_handler(id);
    server
        .add_handler(HandlerEntry::new(Method::GET, "/r", |d| {
            let mut res = Response::new();
            res.set_data(b"two".to_vec());
            d.respond(res);
        }))
        .unwrap();
    assert_eq!(
        client.request("GET /r HTTP/1.1\r\nHost: x\r\n\r\n").body_str(),
        "two"
    );

    server.stop();
    may_httpd::close(&server);
}

#[test]
fn test_removed_handler_cleanup_runs_after_last_dispatch() {
    setup();
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    struct CountsDrop;
    impl Drop for CountsDrop {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    let port = free_port();
    let (server, addr) = open_started(port);
    let state = CountsDrop;
    let id = server
        .add_handler(HandlerEntry::new(Method::GET, "/c", move |d| {
            let _keepalive = &state;
            let mut res = Response::new();
            res.set_data(b"counted".to_vec());
            d.respond(res);
        }))
        .unwrap();
    server.start().unwrap();
    wait_ready(addr);

    let mut client = Client::connect(addr);
    assert_eq!(
        client.request("GET /c HTTP/1.1\r\nHost: x\r\n\r\n").body_str(),
        "counted"
    );
    assert_eq!(DROPS.load(Ordering::SeqCst), 0);

    // Removal detaches the entry and, with no dispatch in flight, runs
    // the captured state's cleanup.
    server.remove_handler(id);
    assert_eq!(DROPS.load(Ordering::SeqCst), 1);

    assert_eq!(
        client.request("GET /c HTTP/1.1\r\nHost: x\r\n\r\n").status(),
        404
    );

    server.stop();
    may_httpd::close(&server);
}
