//! TCP networking primitives.
//!
//! Thin owning wrappers over raw sockets for the readiness loop:
//! - [`tcp_listener`]: [`TcpListener`] binding, listening and accepting without blocking
//! - [`tcp_stream`]: [`TcpStream`] single-shot non-blocking reads and writes
//! - [`utils`]: Address conversion utilities
//!
//! Both types close their descriptor on drop.
//!
//! [`TcpListener`]: tcp_listener::TcpListener
//! [`TcpStream`]: tcp_stream::TcpStream

pub mod tcp_listener;
pub mod tcp_stream;
pub(crate) mod utils;
