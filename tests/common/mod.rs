#![allow(dead_code)]

pub mod test_server {
    use std::sync::Once;

    /// Ensures the may runtime is configured only once per test binary.
    static MAY_INIT: Once = Once::new();

    pub fn setup() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
                )
                .with_test_writer()
                .try_init();
        });
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::time::{Duration, Instant};

    /// Grab a port the OS considers free right now. Tests bind it again
    /// immediately, so the usual race window is acceptable here.
    pub fn free_port() -> u16 {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        listener.local_addr().unwrap().port()
    }

    /// Wait until the server accepts connections.
    pub fn wait_ready(addr: SocketAddr) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if TcpStream::connect(addr).is_ok() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("server at {addr} not ready");
    }

    /// A raw HTTP/1.x test client that keeps its connection open so
    /// persistence behavior is observable.
    pub struct Client {
        stream: TcpStream,
    }

    impl Client {
        pub fn connect(addr: SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            Self { stream }
        }

        pub fn send(&mut self, raw: &str) {
            self.stream.write_all(raw.as_bytes()).unwrap();
        }

        /// Read one response: headers fully, then exactly Content-Length
        /// body bytes (HEAD responses carry none regardless).
        pub fn read_response(&mut self, head_request: bool) -> HttpResponse {
            let mut buf = Vec::new();
            let header_end = loop {
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                let mut tmp = [0u8; 1024];
                let n = self.stream.read(&mut tmp).expect("response read");
                assert!(n > 0, "connection closed before response head");
                buf.extend_from_slice(&tmp[..n]);
            };

            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);

            let mut body = buf[header_end..].to_vec();
            let want = if head_request { 0 } else { content_length };
            while body.len() < want {
                let mut tmp = [0u8; 1024];
                let n = self.stream.read(&mut tmp).expect("body read");
                assert!(n > 0, "connection closed mid-body");
                body.extend_from_slice(&tmp[..n]);
            }
            HttpResponse { head, body }
        }

        pub fn request(&mut self, raw: &str) -> HttpResponse {
            self.send(raw);
            self.read_response(raw.starts_with("HEAD "))
        }

        /// True when the peer has closed: the next read returns EOF.
        pub fn at_eof(&mut self) -> bool {
            let mut tmp = [0u8; 1];
            matches!(self.stream.read(&mut tmp), Ok(0))
        }

        pub fn stream(&mut self) -> &mut TcpStream {
            &mut self.stream
        }
    }

    pub struct HttpResponse {
        pub head: String,
        pub body: Vec<u8>,
    }

    impl HttpResponse {
        pub fn status(&self) -> u16 {
            self.head
                .split_whitespace()
                .nth(1)
                .and_then(|s| s.parse().ok())
                .expect("status code in response head")
        }

        pub fn header(&self, name: &str) -> Option<&str> {
            self.head
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.trim())
        }

        pub fn body_str(&self) -> String {
            String::from_utf8_lossy(&self.body).to_string()
        }
    }
}
