//! # Server Module
//!
//! The server object, its accept loop, per-connection sessions, and the
//! process-wide server directory.
//!
//! ## Architecture
//!
//! ```text
//! open(url) → directory → Server ── accept loop ──┐
//!                            │                     ▼
//!                            │              Session (one per connection)
//!                            │                     │ read → route → dispatch → write
//!                            └── Registry ◄────────┘
//! ```
//!
//! The [`Server`] owns the listener, the routing table, and the set of
//! live sessions. Each accepted connection gets a session coroutine that
//! drives the request/response cycle until the connection closes, the
//! server stops, or an upgrader handler takes the transport over.
//!
//! ## Lifecycle
//!
//! Servers come from [`open`], which deduplicates by host and port so
//! independent components share one listener. `start`/`stop` nest; the
//! final `stop` is abortive: it cancels the accept loop and every live
//! session and waits for them to finish. [`close`] releases the directory
//! reference and destroys the server with the last one.

pub(crate) mod core;
mod directory;
mod session;
mod static_files;

pub use core::Server;
pub use directory::{close, open};
