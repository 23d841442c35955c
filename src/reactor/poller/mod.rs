//! Readiness facility backing the reactor.
//!
//! Only Linux `epoll` is implemented.

mod epoll;

pub use epoll::Poller;
