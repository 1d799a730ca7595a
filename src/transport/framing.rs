use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};

use http::Method;
use may::net::TcpStream;

use crate::http::{Request, Response};

/// Upper bound on a request head (request line plus headers).
///
/// A head that grows past this without terminating is answered with
/// `400 Bad Request` rather than buffered indefinitely.
pub const MAX_HEAD_BYTES: usize = 32 * 1024;

const MAX_HEADERS: usize = 64;

/// Why a request read did not produce a request.
///
/// The session maps these onto its state machine: `Closed` and `Io` tear
/// the connection down silently, the rest produce an error response first.
#[derive(Debug)]
pub enum ReadError {
    /// The peer closed the connection cleanly between requests.
    Closed,
    Io(io::Error),
    /// The head exceeded [`MAX_HEAD_BYTES`].
    TooLarge,
    /// The bytes on the wire are not an HTTP/1.x request head.
    Malformed,
    /// The request line carried a version token that is not HTTP/1 at
    /// all. The token is kept so the caller can distinguish a genuine
    /// HTTP/2+ request from garbage or HTTP/0.x.
    Version(String),
}

enum Pipe {
    Plain(TcpStream),
    #[cfg(feature = "tls")]
    Tls(Box<rustls::StreamOwned<rustls::ServerConnection, TcpStream>>),
}

impl Pipe {
    fn sock(&self) -> &TcpStream {
        match self {
            Pipe::Plain(s) => s,
            #[cfg(feature = "tls")]
            Pipe::Tls(s) => s.get_ref(),
        }
    }
}

impl Read for Pipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Pipe::Plain(s) => s.read(buf),
            #[cfg(feature = "tls")]
            Pipe::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Pipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Pipe::Plain(s) => s.write(buf),
            #[cfg(feature = "tls")]
            Pipe::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Pipe::Plain(s) => s.flush(),
            #[cfg(feature = "tls")]
            Pipe::Tls(s) => s.flush(),
        }
    }
}

/// A byte pipe with HTTP/1.x message framing.
pub struct HttpTransport {
    pipe: Pipe,
    /// Bytes read off the wire but not yet consumed by framing.
    rbuf: Vec<u8>,
}

impl HttpTransport {
    /// Frame HTTP over a plain TCP stream.
    pub fn plain(stream: TcpStream) -> Self {
        Self {
            pipe: Pipe::Plain(stream),
            rbuf: Vec::new(),
        }
    }

    /// Frame HTTP over a server-side TLS stream.
    ///
    /// The handshake is driven lazily by the first read or write.
    #[cfg(feature = "tls")]
    pub fn tls(config: &super::TlsConfig, stream: TcpStream) -> crate::Result<Self> {
        let conn = rustls::ServerConnection::new(config.server_config())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        Ok(Self {
            pipe: Pipe::Tls(Box::new(rustls::StreamOwned::new(conn, stream))),
            rbuf: Vec::new(),
        })
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.pipe.sock().peer_addr()
    }

    /// Read one request head off the wire into `req`.
    ///
    /// Bytes beyond the head stay buffered; the next call parses them
    /// before touching the socket again, so a client that sent early does
    /// not deadlock the connection.
    pub fn read_request(&mut self, req: &mut Request) -> Result<(), ReadError> {
        req.reset();
        loop {
            if let Some(end) = head_end(&self.rbuf) {
                return self.parse_head(end, req);
            }
            if self.rbuf.len() > MAX_HEAD_BYTES {
                return Err(ReadError::TooLarge);
            }
            let mut chunk = [0u8; 4096];
            let n = self.pipe.read(&mut chunk).map_err(ReadError::Io)?;
            if n == 0 {
                return if self.rbuf.is_empty() {
                    Err(ReadError::Closed)
                } else {
                    Err(ReadError::Malformed)
                };
            }
            self.rbuf.extend_from_slice(&chunk[..n]);
        }
    }

    fn parse_head(&mut self, end: usize, req: &mut Request) -> Result<(), ReadError> {
        match fill_from_head(&self.rbuf[..end], None, req) {
            Ok(()) => {
                self.rbuf.drain(..end);
                Ok(())
            }
            Err(ReadError::Version(v)) => {
                // httparse frames only 1.0 and 1.1, but any HTTP/1 minor
                // is still an HTTP/1 request and must be served (the
                // session marks it non-persistent). Re-parse with the
                // token normalized to 1.1, keeping the original token on
                // the request.
                match normalize_http1_head(&self.rbuf[..end], &v) {
                    Some(scratch) => {
                        fill_from_head(&scratch, Some(&v), req)?;
                        self.rbuf.drain(..end);
                        Ok(())
                    }
                    None => Err(ReadError::Version(v)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Write the status line and headers of a response.
    pub fn write_response(&mut self, res: &Response) -> io::Result<()> {
        self.pipe.write_all(&res.encode_head())?;
        self.pipe.flush()
    }

    /// Write a complete body buffer.
    pub fn write_full(&mut self, body: &[u8]) -> io::Result<()> {
        self.pipe.write_all(body)?;
        self.pipe.flush()
    }

    /// Shut the connection down. Idempotent; errors are ignored because
    /// the peer may already be gone.
    pub fn close(&mut self) {
        #[cfg(feature = "tls")]
        if let Pipe::Tls(s) = &mut self.pipe {
            s.conn.send_close_notify();
            let _ = s.flush();
        }
        let _ = self.pipe.sock().shutdown(Shutdown::Both);
    }
}

/// After an upgrade the new owner reads raw bytes; anything the framer
/// buffered past the last head is delivered before the socket is touched.
impl Read for HttpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.rbuf.is_empty() {
            let n = self.rbuf.len().min(buf.len());
            buf[..n].copy_from_slice(&self.rbuf[..n]);
            self.rbuf.drain(..n);
            return Ok(n);
        }
        self.pipe.read(buf)
    }
}

impl Write for HttpTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pipe.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.pipe.flush()
    }
}

/// Parse a complete head out of `buf` into `req`. `version_override`
/// carries the original request-line token when the head was normalized
/// before parsing.
fn fill_from_head(
    buf: &[u8],
    version_override: Option<&str>,
    req: &mut Request,
) -> Result<(), ReadError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);
    match parsed.parse(buf) {
        Ok(httparse::Status::Complete(_)) => {
            let method = parsed.method.ok_or(ReadError::Malformed)?;
            req.set_method(
                Method::from_bytes(method.as_bytes()).map_err(|_| ReadError::Malformed)?,
            );
            req.set_uri(parsed.path.ok_or(ReadError::Malformed)?);
            match version_override {
                Some(v) => req.set_version(v),
                None => req.set_version(match parsed.version.ok_or(ReadError::Malformed)? {
                    0 => "HTTP/1.0",
                    _ => "HTTP/1.1",
                }),
            }
            for h in parsed.headers.iter() {
                let value = std::str::from_utf8(h.value).map_err(|_| ReadError::Malformed)?;
                req.add_header(h.name, value);
            }
            Ok(())
        }
        Ok(httparse::Status::Partial) => Err(ReadError::Malformed),
        Err(httparse::Error::Version) => Err(ReadError::Version(request_line_version(buf))),
        Err(_) => Err(ReadError::Malformed),
    }
}

/// Rewrite the request line of `head` with the version token replaced by
/// `HTTP/1.1`, but only when `version` is an `HTTP/1.<minor>` token. Any
/// other token returns `None` and stays a version error.
fn normalize_http1_head(head: &[u8], version: &str) -> Option<Vec<u8>> {
    let minor = version.strip_prefix("HTTP/1.")?;
    if minor.is_empty() || !minor.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let line_end = head.windows(2).position(|w| w == b"\r\n")?;
    let line = &head[..line_end];
    let token_start = line.iter().rposition(|&b| b == b' ' || b == b'\t')? + 1;
    if &line[token_start..] != version.as_bytes() {
        return None;
    }
    let mut scratch = Vec::with_capacity(head.len());
    scratch.extend_from_slice(&head[..token_start]);
    scratch.extend_from_slice(b"HTTP/1.1");
    scratch.extend_from_slice(&head[line_end..]);
    Some(scratch)
}

fn head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

/// Pull the version token out of a request line httparse refused.
fn request_line_version(buf: &[u8]) -> String {
    let line_end = buf
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(buf.len());
    let line = String::from_utf8_lossy(&buf[..line_end]);
    line.split_whitespace()
        .nth(2)
        .unwrap_or_default()
        .to_string()
}
