//! Readiness-driven connection handling.
//!
//! This module provides the epoll event loop and the state it drives.
//! It includes:
//! - [`core`]: The [`Server`](core::Server) loop: wait, dispatch, repeat
//! - [`event`]: Interest sets and epoll event wrappers
//! - [`io`]: Per-connection state machine
//! - [`poller`]: The epoll instance and its registrations
//! - [`socket`]: Accepting and admitting new connections

pub mod core;
pub mod event;
pub mod io;
pub mod poller;
pub(crate) mod socket;
