//! Request-target canonicalization.
//!
//! Incoming request lines may carry an absolute URI, a query string, and
//! percent escapes. Handler matching operates on a canonical path: scheme
//! and authority stripped, query dropped, escapes decoded. Decoding only
//! ever shrinks the input, and malformed escapes are passed through as-is
//! rather than rejected, so canonicalization never fails.

fn hexval(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Reduce a request target to a canonical path.
///
/// Truncates at the first `?`, skips a leading `http://` or `https://`
/// authority (an absolute URI with no path component canonicalizes to
/// `/`), then percent-decodes. A decoded NUL truncates the path: route
/// matching treats the target as a NUL-free string, and clients sending
/// `%00` do not get to smuggle bytes past it.
pub fn canonify(target: &str) -> String {
    let mut path = match target.find('?') {
        Some(q) => &target[..q],
        None => target,
    };

    let lower = path.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        let after_scheme = &path[path.find("://").unwrap() + 3..];
        match after_scheme.find('/') {
            Some(slash) => path = &after_scheme[slash..],
            None => return "/".to_string(),
        }
    }

    let src = path.as_bytes();
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        if src[i] == b'%' && i + 2 < src.len() {
            if let (Some(hi), Some(lo)) = (hexval(src[i + 1]), hexval(src[i + 2])) {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        // Malformed escape: garbage in, garbage out.
        out.push(src[i]);
        i += 1;
    }
    if let Some(nul) = out.iter().position(|&b| b == 0) {
        out.truncate(nul);
    }
    String::from_utf8_lossy(&out).into_owned()
}
