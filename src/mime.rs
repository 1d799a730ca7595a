//! Content-type detection by file extension.
//!
//! Used by the file-serving convenience handlers when the caller does not
//! supply an explicit content type. The table is intentionally small; it is
//! a fallback, not a registry of everything a server might serve.

static CONTENT_MAP: &[(&str, &str)] = &[
    (".ai", "application/postscript"),
    (".aif", "audio/aiff"),
    (".aiff", "audio/aiff"),
    (".avi", "video/avi"),
    (".au", "audio/basic"),
    (".bin", "application/octet-stream"),
    (".bmp", "image/bmp"),
    (".css", "text/css"),
    (".eps", "application/postscript"),
    (".gif", "image/gif"),
    (".htm", "text/html"),
    (".html", "text/html"),
    (".ico", "image/x-icon"),
    (".jpeg", "image/jpeg"),
    (".jpg", "image/jpeg"),
    (".js", "application/javascript"),
    (".md", "text/markdown"),
    (".mp2", "video/mpeg"),
    (".mp3", "audio/mpeg3"),
    (".mpeg", "video/mpeg"),
    (".mpg", "video/mpeg"),
    (".pdf", "application/pdf"),
    (".png", "image/png"),
    (".ps", "application/postscript"),
    (".rtf", "text/rtf"),
    (".text", "text/plain"),
    (".tif", "image/tiff"),
    (".tiff", "image/tiff"),
    (".txt", "text/plain"),
    (".wav", "audio/wav"),
    ("README", "text/plain"),
];

/// Look up a content type for a file path by suffix, case-insensitively.
///
/// Returns `None` when no entry matches; callers fall back to their own
/// default (the blob handler uses `application/octet-stream`).
pub fn lookup_content_type(path: &str) -> Option<&'static str> {
    let pb = path.as_bytes();
    for (ext, typ) in CONTENT_MAP {
        let eb = ext.as_bytes();
        if pb.len() >= eb.len() && pb[pb.len() - eb.len()..].eq_ignore_ascii_case(eb) {
            return Some(typ);
        }
    }
    None
}
