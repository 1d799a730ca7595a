//! # Router Module
//!
//! The handler registry: the routing table consulted once per request.
//!
//! ## Overview
//!
//! Handlers are registered against a method, a path, and optionally a
//! virtual host. Registration rejects overlapping entries up front, so the
//! table never holds two handlers that could both claim a request and the
//! scan order is immaterial for correctness.
//!
//! ## Lifetime
//!
//! Entries are shared: the registry holds one reference, and every
//! dispatch in flight holds another for as long as the handler is running.
//! Removing an entry detaches it from the table immediately; in-flight
//! dispatches to it complete normally, and the entry (including any state
//! captured by its closure) is destroyed when the last reference drops.

mod core;
mod handler;

pub use core::{Registry, RouteLookup};
pub use handler::{HandlerEntry, HandlerId};
