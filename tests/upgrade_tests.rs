//! Tests for protocol-upgrade handlers: transport takeover, raw writes
//! through a live dispatch, and session teardown that leaves the byte
//! pipe untouched.

mod common;

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use http::Method;
use may_httpd::{HandlerEntry, Response, Server};

use common::http::{free_port, wait_ready, Client};
use common::test_server::setup;

fn open_started(port: u16) -> (Arc<Server>, SocketAddr) {
    let server = may_httpd::open(&format!("http://127.0.0.1:{port}")).unwrap();
    (server, format!("127.0.0.1:{port}").parse().unwrap())
}

#[test]
fn test_upgrader_takes_over_transport() {
    setup();
    let port = free_port();
    let (server, addr) = open_started(port);
    server
        .add_handler(
            HandlerEntry::new(Method::GET, "/ws", |dispatch| {
                let (mut transport, request) = dispatch.into_upgrade().unwrap();
                assert_eq!(request.uri(), "/ws");
                // The upgrader owns the pipe now: speak a non-HTTP echo
                // protocol on it from a coroutine of its own.
                may::go!(move || {
                    transport
                        .write_all(b"HTTP/1.1 101 Switching Protocols\r\n\r\n")
                        .unwrap();
                    let mut buf = [0u8; 4];
                    transport.read_exact(&mut buf).unwrap();
                    transport.write_all(&buf).unwrap();
                });
            })
            .upgrader(),
        )
        .unwrap();
    server.start().unwrap();
    wait_ready(addr);

    let mut client = Client::connect(addr);
    let res = client.request("GET /ws HTTP/1.1\r\nHost: x\r\nUpgrade: echo\r\n\r\n");
    assert_eq!(res.status(), 101);

    // The session is gone but the pipe is alive and owned by the upgrader.
    client.stream().write_all(b"ping").unwrap();
    let mut echo = [0u8; 4];
    client.stream().read_exact(&mut echo).unwrap();
    assert_eq!(&echo, b"ping");

    // The server is still healthy for ordinary connections.
    server
        .add_handler(HandlerEntry::new(Method::GET, "/ok", |d| {
            let mut res = Response::new();
            res.set_data(b"ok".to_vec());
            d.respond(res);
        }))
        .unwrap();
    let mut plain = Client::connect(addr);
    assert_eq!(
        plain.request("GET /ok HTTP/1.1\r\nHost: x\r\n\r\n").status(),
        200
    );

    server.stop();
    may_httpd::close(&server);
}

#[test]
fn test_upgrader_can_write_raw_and_keep_session() {
    setup();
    let port = free_port();
    let (server, addr) = open_started(port);
    server
        .add_handler(
            HandlerEntry::new(Method::GET, "/raw", |mut dispatch| {
                // Write a complete response by hand, then give the
                // transport back: the session keeps serving.
                let transport = dispatch.transport().expect("upgrader gets the transport");
                transport
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nraw")
                    .unwrap();
                dispatch.finish();
            })
            .upgrader(),
        )
        .unwrap();
    server.start().unwrap();
    wait_ready(addr);

    let mut client = Client::connect(addr);
    let res = client.request("GET /raw HTTP/1.1\r\nHost: x\r\n\r\n");
    assert_eq!(res.status(), 200);
    assert_eq!(res.body_str(), "raw");

    // Second request on the same connection still works.
    let res = client.request("GET /raw HTTP/1.1\r\nHost: x\r\n\r\n");
    assert_eq!(res.body_str(), "raw");

    server.stop();
    may_httpd::close(&server);
}

#[test]
fn test_dropped_dispatch_closes_session() {
    setup();
    let port = free_port();
    let (server, addr) = open_started(port);
    server
        .add_handler(HandlerEntry::new(Method::GET, "/drop", |dispatch| {
            // Handler walks away without completing.
            drop(dispatch);
        }))
        .unwrap();
    server.start().unwrap();
    wait_ready(addr);

    let mut client = Client::connect(addr);
    client.send("GET /drop HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(client.at_eof());

    server.stop();
    may_httpd::close(&server);
}
