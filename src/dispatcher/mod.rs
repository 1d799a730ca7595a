//! # Dispatcher Module
//!
//! Delivery of matched requests to user handlers and collection of their
//! completions.
//!
//! ## Overview
//!
//! A session that matched a request builds a [`Dispatch`] and invokes the
//! handler callback with it, then parks on a reply channel. The handler
//! completes the dispatch exactly once: with a response, with a failure,
//! or (for protocol upgraders) by taking the transport and walking away.
//! The session resumes when the completion arrives, whichever coroutine it
//! was sent from.
//!
//! ## Handler contract
//!
//! - A handler may complete the dispatch synchronously inside the callback,
//!   or move it into a coroutine of its own and complete it later.
//! - Every dispatch is completed exactly once. Dropping a `Dispatch`
//!   without completing it (including a handler panic unwinding past it)
//!   counts as a failure and closes the session, returning the transport
//!   on the way out so it is not leaked mid-upgrade.
//! - Only handlers registered as upgraders are handed the transport.

mod core;

pub(crate) use core::Completion;
pub use core::{Dispatch, HandlerFn};
