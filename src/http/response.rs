use http::StatusCode;

use super::{find_header, HeaderVec};

/// An HTTP response under construction by a handler.
///
/// The head (status line and headers) and the body are written to the wire
/// separately by the session; `Content-Length` is supplied at serialization
/// time from the body length unless the handler set one explicitly.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderVec,
    body: Vec<u8>,
}

impl Response {
    /// An empty `200 OK` response.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            reason: None,
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    /// A canned error response with a small JSON body.
    pub fn error(status: StatusCode) -> Self {
        let reason = status.canonical_reason().unwrap_or("Error");
        let body = serde_json::json!({
            "error": reason,
            "status": status.as_u16(),
        });
        let mut res = Self::new();
        res.status = status;
        res.set_header("Content-Type", "application/json");
        res.set_data(body.to_string().into_bytes());
        res
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reason(&self) -> &str {
        match &self.reason {
            Some(r) => r,
            None => self.status.canonical_reason().unwrap_or(""),
        }
    }

    pub fn set_status(&mut self, status: StatusCode, reason: &str) {
        self.status = status;
        self.reason = Some(reason.to_string());
    }

    /// Case-insensitive header lookup; returns the first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Set a header, replacing an existing one of the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let Some(slot) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            slot.1.clear();
            slot.1.push_str(value);
        } else {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }

    pub fn set_data(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    pub fn data(&self) -> &[u8] {
        &self.body
    }

    /// Serialize the status line and headers.
    ///
    /// `Content-Length` is emitted from the body length when the handler did
    /// not set one, including `0` for empty bodies so persistent connections
    /// can delimit responses.
    pub(crate) fn encode_head(&self) -> Vec<u8> {
        let mut head = Vec::with_capacity(128);
        head.extend_from_slice(b"HTTP/1.1 ");
        head.extend_from_slice(self.status.as_str().as_bytes());
        head.push(b' ');
        head.extend_from_slice(self.reason().as_bytes());
        head.extend_from_slice(b"\r\n");
        for (name, value) in &self.headers {
            head.extend_from_slice(name.as_bytes());
            head.extend_from_slice(b": ");
            head.extend_from_slice(value.as_bytes());
            head.extend_from_slice(b"\r\n");
        }
        if self.header("content-length").is_none() {
            head.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        head.extend_from_slice(b"\r\n");
        head
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
