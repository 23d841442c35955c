use crate::error::ConnectionError;
use crate::net::tcp_stream::TcpStream;
use crate::reactor::event::{Event, Interest};

use std::io;
use tracing::trace;

/// Upper bound on bytes discarded while closing a connection.
const LINGER_DRAIN_MAX: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingRequest,
    AwaitingResponse,
}

/// What the driver should do with a connection after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Pending,
    Complete,
}

/// Per-connection state held in a slot.
pub struct Connection {
    stream: TcpStream,
    phase: Phase,
    interest: Interest,
    written: usize,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            phase: Phase::AwaitingRequest,
            interest: Interest::BOTH,
            written: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Applies one readiness event. Reads are handled before writes.
    pub(crate) fn on_event(
        &mut self,
        event: &Event,
        scratch: &mut [u8],
        payload: &[u8],
    ) -> Result<Progress, ConnectionError> {
        if event.is_error() {
            let err = self
                .stream
                .take_error()
                .map_err(ConnectionError::Socket)?
                .unwrap_or_else(|| io::Error::other("socket error without SO_ERROR"));
            return Err(ConnectionError::Socket(err));
        }

        if event.is_readable() {
            self.on_readable(scratch)?;
        }

        if event.is_writable() {
            return self.on_writable(payload);
        }

        Ok(Progress::Pending)
    }

    /// Reads once and throws the bytes away.
    fn on_readable(&mut self, scratch: &mut [u8]) -> Result<(), ConnectionError> {
        loop {
            match self.stream.read(scratch) {
                Ok(n) => {
                    trace!(peer = %self.stream.peer_addr(), bytes = n, "request read");
                    self.phase = Phase::AwaitingResponse;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(ConnectionError::Read(e)),
            }
        }
    }

    /// Writes as much of `payload` as the socket takes, resuming where it left off.
    fn on_writable(&mut self, payload: &[u8]) -> Result<Progress, ConnectionError> {
        self.phase = Phase::AwaitingResponse;

        while self.written < payload.len() {
            match self.stream.write(&payload[self.written..]) {
                Ok(0) => {
                    return Err(ConnectionError::Write(io::Error::from(
                        io::ErrorKind::WriteZero,
                    )));
                }
                Ok(n) => self.written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Progress::Pending),
                Err(e) => return Err(ConnectionError::Write(e)),
            }
        }

        trace!(peer = %self.stream.peer_addr(), bytes = self.written, "response written");

        Ok(Progress::Complete)
    }

    /// Sends FIN and discards whatever the peer already queued, so the final
    /// close does not turn into a reset that could eat the response.
    pub(crate) fn linger(&self, scratch: &mut [u8]) {
        if self.stream.shutdown_write().is_err() {
            return;
        }

        let mut drained = 0;
        while drained < LINGER_DRAIN_MAX {
            match self.stream.read(scratch) {
                Ok(0) => break,
                Ok(n) => drained += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    }
}
