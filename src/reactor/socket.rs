use crate::error::AcceptError;
use crate::net::tcp_listener::TcpListener;
use crate::reactor::event::Interest;
use crate::reactor::io::Connection;
use crate::reactor::poller::Poller;
use crate::utils::slot_table::SlotTable;

use std::os::unix::io::{AsRawFd, RawFd};
use tracing::{debug, warn};

/// Result of handling one listener readiness notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Admitted(RawFd),
    /// Table full; the connection stays in the kernel backlog.
    AtCapacity,
    /// Readiness without a pending connection.
    Spurious,
    Failed,
}

/// Accepts at most one connection and gives it a slot and a registration.
pub(crate) fn accept_client(
    listener: &TcpListener,
    poller: &mut Poller,
    connections: &mut SlotTable<Connection>,
) -> Admission {
    if connections.is_at_capacity() {
        return Admission::AtCapacity;
    }

    let (stream, peer) = match listener.accept_one() {
        Ok(accepted) => accepted,
        Err(AcceptError::WouldBlock) => return Admission::Spurious,
        Err(e) => {
            warn!(error = ?e, "accept failed");
            return Admission::Failed;
        }
    };

    let fd = stream.as_raw_fd();

    if let Err(e) = connections.try_insert(fd, Connection::new(stream)) {
        warn!(fd, %peer, error = %e, "admission refused");
        return Admission::Failed;
    }

    if let Err(e) = poller.register(fd, Interest::BOTH) {
        warn!(fd, %peer, error = ?e, "failed to register connection");
        // dropping the slot closes the stream
        connections.remove(fd);
        return Admission::Failed;
    }

    debug!(fd, %peer, active = connections.len(), "connection admitted");

    Admission::Admitted(fd)
}
