use http::Method;

use super::{find_header, HeaderVec};

/// A parsed HTTP request head.
///
/// Filled in place by `HttpTransport::read_request` so a persistent
/// connection can reuse one allocation across requests; `reset` clears the
/// contents but keeps capacity.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: String,
    version: String,
    headers: HeaderVec,
}

impl Request {
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            uri: String::new(),
            version: String::new(),
            headers: HeaderVec::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target exactly as it appeared on the request line.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The version token from the request line, e.g. `HTTP/1.1`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Case-insensitive header lookup; returns the first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Clear all fields for the next read, retaining capacity.
    pub fn reset(&mut self) {
        self.method = Method::GET;
        self.uri.clear();
        self.version.clear();
        self.headers.clear();
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn set_uri(&mut self, uri: &str) {
        self.uri.clear();
        self.uri.push_str(uri);
    }

    pub fn set_version(&mut self, version: &str) {
        self.version.clear();
        self.version.push_str(version);
    }

    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}
