//! Minimal single-threaded epoll server.
//!
//! Every accepted connection has its request read and discarded, receives one
//! fixed HTTP response, and is closed. There is no pipelining, keep-alive or
//! request parsing.
//!
//! # Architecture
//!
//! - **Server**: Event loop owning the listener, poller and slot table (`reactor::core`)
//! - **Poller**: epoll registrations and the blocking wait (`reactor::poller`)
//! - **SlotTable**: Bounded, compacting map from descriptor to connection state
//! - **Connection**: AwaitingRequest → AwaitingResponse → closed (`reactor::io`)
//! - **TcpListener / TcpStream**: Owning non-blocking socket wrappers (`net`)
//! - **DeadlineQueue**: Per-connection timeouts (`timer`)
//! - **Shutdown**: Cancellation flag wired to SIGINT/SIGTERM (`signal`)

pub mod config;
pub mod error;
pub mod logging;
pub mod net;
pub mod reactor;
pub mod response;
pub mod signal;
pub mod timer;
pub mod utils;

pub use config::ServerConfig;
pub use error::{ServerError, StartupError};
pub use reactor::core::{Server, ServerStats};
pub use response::Response;
pub use signal::Shutdown;
