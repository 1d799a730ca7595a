//! # HTTP Message Module
//!
//! Request and response objects exchanged between the transport, the
//! session state machine, and user handlers.
//!
//! These are deliberately plain containers: the framing (parsing a request
//! head off the wire, serializing a response head onto it) lives in the
//! `transport` module, and routing decisions live in `router`. Header
//! lookup is case-insensitive everywhere; insertion order is preserved.

mod request;
mod response;

pub use request::Request;
pub use response::Response;

use smallvec::SmallVec;

/// Number of headers stored inline before spilling to the heap.
///
/// Typical requests carry well under this many headers, so the common case
/// never allocates for header storage.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage shared by requests and responses.
pub type HeaderVec = SmallVec<[(String, String); MAX_INLINE_HEADERS]>;

pub(crate) fn find_header<'a>(headers: &'a HeaderVec, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
