use crate::config::ServerConfig;
use crate::error::{ConnectionError, ServerError, StartupError};
use crate::net::tcp_listener::TcpListener;
use crate::reactor::event::{Event, Events, Interest};
use crate::reactor::io::{Connection, Progress};
use crate::reactor::poller::Poller;
use crate::reactor::socket::{Admission, accept_client};
use crate::response::Response;
use crate::signal::Shutdown;
use crate::timer::DeadlineQueue;
use crate::utils::slot_table::SlotTable;

use std::io;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Counters kept over the lifetime of a [`Server`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Connections admitted into the slot table.
    pub accepted: u64,
    /// Connections that received the full response.
    pub completed: u64,
    /// Connections closed because of an error or shutdown.
    pub failed: u64,
    /// Connections closed because their deadline passed.
    pub timed_out: u64,
    /// Listener notifications left in the backlog because the table was full.
    pub deferred: u64,
}

/// Single-threaded readiness loop answering every connection with a fixed response.
///
/// The server owns the listener, the epoll instance and the slot table. A
/// connection is registered with the poller exactly while it holds a slot.
///
/// # Example
/// ```ignore
/// let shutdown = Shutdown::new();
/// let mut server = Server::bind(ServerConfig::default())?;
/// server.run(&shutdown)?;
/// ```
pub struct Server {
    config: ServerConfig,
    response: Response,
    connections: SlotTable<Connection>,
    deadlines: DeadlineQueue,
    listener: TcpListener,
    poller: Poller,
    events: Events,
    scratch: Vec<u8>,
    accepting: bool,
    draining: bool,
    stats: ServerStats,
}

impl Server {
    /// Validates `config`, binds the listener and registers it for readability.
    ///
    /// # Returns
    /// A ready-to-run [`Server`], or the [`StartupError`] for the step that failed
    pub fn bind(config: ServerConfig) -> Result<Self, StartupError> {
        config.validate()?;

        // one extra slot for the listener
        let event_capacity = config.max_connections.saturating_add(1);
        let mut poller = Poller::new(event_capacity)?;
        let listener = TcpListener::bind(config.bind_address, config.bind_port, config.backlog)?;

        poller
            .register(listener.as_raw_fd(), Interest::READABLE)
            .map_err(StartupError::Register)?;

        let local = listener.local_addr().map_err(StartupError::Socket)?;
        info!(
            address = %local,
            max_connections = config.max_connections,
            backlog = config.backlog,
            "listening"
        );

        Ok(Self {
            response: Response::new(&config.response_body),
            connections: SlotTable::with_capacity(config.max_connections),
            deadlines: DeadlineQueue::new(),
            events: Events::with_capacity(event_capacity),
            scratch: vec![0u8; config.read_buffer_size],
            listener,
            poller,
            accepting: true,
            draining: false,
            stats: ServerStats::default(),
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn stats(&self) -> ServerStats {
        self.stats
    }

    /// Number of occupied connection slots.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn connection_ids(&self) -> Vec<RawFd> {
        self.connections.ids()
    }

    /// Whether `fd` currently has a registration with the poller.
    pub fn is_registered(&self, fd: RawFd) -> bool {
        self.poller.is_registered(fd)
    }

    /// Registrations held by the poller, the listener's included.
    pub fn registration_count(&self) -> usize {
        self.poller.registered_count()
    }

    /// `false` while the listener is parked because every slot is taken.
    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Serves until `shutdown` is triggered, then drains and returns.
    pub fn run(&mut self, shutdown: &Shutdown) -> Result<(), ServerError> {
        let idle = self.config.idle_wait_timeout();

        while !shutdown.is_triggered() {
            self.turn(idle)?;
        }

        info!(active = self.connections.len(), "shutdown requested");
        self.drain()
    }

    /// Runs one wait-and-dispatch iteration.
    ///
    /// Blocks for at most `max_wait` (less if a connection deadline is
    /// sooner) and returns the number of events handled.
    pub fn turn(&mut self, max_wait: Duration) -> Result<usize, ServerError> {
        let timeout = match self.deadlines.next_remaining(Instant::now()) {
            Some(remaining) => remaining.min(max_wait),
            None => max_wait,
        };

        let n = self.poller.wait(&mut self.events, timeout)?;
        let listener_fd = self.listener.as_raw_fd();

        for index in 0..n {
            let Some(event) = self.events.get(index) else {
                break;
            };

            if event.fd() == listener_fd {
                self.on_listener_ready()?;
            } else {
                self.on_connection_ready(&event);
            }
        }

        self.expire_deadlines(Instant::now());

        if !self.accepting && !self.draining && !self.connections.is_at_capacity() {
            self.resume_accepting()?;
        }

        Ok(n)
    }

    fn on_listener_ready(&mut self) -> Result<(), ServerError> {
        if self.draining {
            return Ok(());
        }

        match accept_client(&self.listener, &mut self.poller, &mut self.connections) {
            Admission::Admitted(fd) => {
                self.stats.accepted += 1;
                if let Some(timeout) = self.config.connection_timeout() {
                    self.deadlines.insert(fd, Instant::now() + timeout);
                }
            }
            Admission::AtCapacity => {
                self.stats.deferred += 1;
                self.pause_accepting()?;
            }
            Admission::Spurious => trace!("spurious listener wakeup"),
            Admission::Failed => {}
        }

        Ok(())
    }

    fn on_connection_ready(&mut self, event: &Event) {
        let fd = event.fd();

        // already closed, e.g. by a deadline or shutdown
        let Some(connection) = self.connections.get_mut(fd) else {
            trace!(fd, "event for closed connection");
            return;
        };

        match connection.on_event(event, &mut self.scratch, self.response.as_bytes()) {
            Ok(Progress::Pending) => {}
            Ok(Progress::Complete) => self.close_connection(fd, None),
            Err(e) => self.close_connection(fd, Some(e)),
        }
    }

    /// Deregisters, releases and forgets one connection.
    ///
    /// The registration is removed before the slot drops and closes the descriptor.
    fn close_connection(&mut self, fd: RawFd, failure: Option<ConnectionError>) {
        let registration = self.poller.deregister(fd);
        self.deadlines.remove(fd);

        let Some(connection) = self.connections.remove(fd) else {
            return;
        };
        let peer = connection.stream().peer_addr();

        if failure.is_none() {
            connection.linger(&mut self.scratch);
        }
        drop(connection);

        if let Err(e) = registration {
            warn!(fd, %peer, error = ?ConnectionError::from(e), "deregistration failed");
        }

        match failure {
            None => {
                self.stats.completed += 1;
                debug!(fd, %peer, active = self.connections.len(), "connection complete");
            }
            Some(ConnectionError::TimedOut(ms)) => {
                self.stats.timed_out += 1;
                warn!(fd, %peer, timeout_ms = ms, "connection timed out");
            }
            Some(e) => {
                self.stats.failed += 1;
                warn!(fd, %peer, error = ?e, "connection closed after failure");
            }
        }
    }

    fn expire_deadlines(&mut self, now: Instant) {
        let timeout_ms = self.config.connection_timeout_ms;

        for fd in self.deadlines.pop_expired(now) {
            if self.connections.contains(fd) {
                self.close_connection(fd, Some(ConnectionError::TimedOut(timeout_ms)));
            }
        }
    }

    fn pause_accepting(&mut self) -> Result<(), ServerError> {
        if !self.accepting {
            return Ok(());
        }

        // stays registered, just without interest, so the backlog cannot spin the loop
        self.poller
            .register(self.listener.as_raw_fd(), Interest::NONE)
            .map_err(ServerError::Listener)?;
        self.accepting = false;

        debug!(capacity = self.connections.capacity(), "at capacity, pausing accepts");

        Ok(())
    }

    fn resume_accepting(&mut self) -> Result<(), ServerError> {
        self.poller
            .register(self.listener.as_raw_fd(), Interest::READABLE)
            .map_err(ServerError::Listener)?;
        self.accepting = true;

        debug!(active = self.connections.len(), "resuming accepts");

        Ok(())
    }

    /// Stops admitting, gives in-flight connections the grace period, then
    /// force-closes whatever is left.
    fn drain(&mut self) -> Result<(), ServerError> {
        self.draining = true;
        self.accepting = false;

        if let Err(e) = self.poller.deregister(self.listener.as_raw_fd()) {
            warn!(error = ?e, "failed to deregister listener");
        }

        let deadline = Instant::now() + self.config.shutdown_grace();
        let idle = self.config.idle_wait_timeout();

        while !self.connections.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.turn(idle.min(deadline - now))?;
        }

        for fd in self.connections.ids() {
            self.close_connection(fd, Some(ConnectionError::ShuttingDown));
        }

        let stats = self.stats;
        info!(
            accepted = stats.accepted,
            completed = stats.completed,
            failed = stats.failed,
            timed_out = stats.timed_out,
            deferred = stats.deferred,
            "server stopped"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use std::io::Read;
    use std::net::{Ipv4Addr, TcpStream as StdTcpStream};
    use std::thread;

    fn config(max_connections: usize) -> ServerConfig {
        ServerConfig {
            bind_address: Ipv4Addr::LOCALHOST,
            bind_port: 0,
            max_connections,
            ..ServerConfig::default()
        }
    }

    fn connect(server: &Server) -> StdTcpStream {
        StdTcpStream::connect(server.local_addr().expect("local addr")).expect("connect")
    }

    fn admit(server: &mut Server) -> Admission {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let admission = accept_client(
                &server.listener,
                &mut server.poller,
                &mut server.connections,
            );
            if admission != Admission::Spurious || Instant::now() >= deadline {
                return admission;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn oversized_config_is_rejected_before_allocating() {
        let result = Server::bind(ServerConfig {
            max_connections: usize::MAX,
            ..config(1)
        });
        let Err(err) = result else {
            panic!("bind must reject usize::MAX connections");
        };
        assert!(matches!(
            err,
            StartupError::Config(ConfigError::TooManyConnections { .. })
        ));
        assert_eq!(ServerError::from(err).exit_code(), 2);

        let result = Server::bind(ServerConfig {
            read_buffer_size: usize::MAX,
            ..config(1)
        });
        assert!(matches!(
            result,
            Err(StartupError::Config(ConfigError::ReadBufferTooLarge { .. }))
        ));
    }

    #[test]
    fn admission_stops_at_capacity() {
        let mut server = Server::bind(config(1)).expect("bind");
        let _first = connect(&server);
        let _second = connect(&server);

        let Admission::Admitted(fd) = admit(&mut server) else {
            panic!("first connection must be admitted");
        };
        assert!(server.is_registered(fd));
        assert_eq!(server.connection_count(), 1);

        assert_eq!(admit(&mut server), Admission::AtCapacity);
        assert_eq!(server.connection_count(), 1);
        assert_eq!(server.registration_count(), 2);

        server.close_connection(fd, None);
        assert_eq!(server.connection_count(), 0);
        assert!(!server.is_registered(fd));

        assert!(matches!(admit(&mut server), Admission::Admitted(_)));
    }

    #[test]
    fn full_table_parks_and_restores_listener() {
        let mut server = Server::bind(config(1)).expect("bind");
        let _first = connect(&server);

        let Admission::Admitted(fd) = admit(&mut server) else {
            panic!("first connection must be admitted");
        };

        server.pause_accepting().expect("pause");
        assert!(!server.is_accepting());
        assert!(server.is_registered(server.listener.as_raw_fd()));

        server.close_connection(fd, None);
        server.turn(Duration::from_millis(1)).expect("turn");
        assert!(server.is_accepting());
    }

    #[test]
    fn expired_connection_is_closed() {
        let mut server = Server::bind(ServerConfig {
            connection_timeout_ms: 1,
            ..config(2)
        })
        .expect("bind");
        let _client = connect(&server);

        let Admission::Admitted(fd) = admit(&mut server) else {
            panic!("connection must be admitted");
        };
        server.deadlines.insert(fd, Instant::now());

        server.expire_deadlines(Instant::now() + Duration::from_millis(5));

        assert_eq!(server.connection_count(), 0);
        assert!(!server.is_registered(fd));
        assert_eq!(server.stats().timed_out, 1);
    }

    #[test]
    fn drain_closes_remaining_connections() {
        let mut server = Server::bind(ServerConfig {
            shutdown_grace_ms: 0,
            ..config(2)
        })
        .expect("bind");
        let mut client = connect(&server);

        assert!(matches!(admit(&mut server), Admission::Admitted(_)));
        server.drain().expect("drain");

        assert_eq!(server.connection_count(), 0);
        assert_eq!(server.registration_count(), 0);
        assert_eq!(server.stats().failed, 1);

        // closed without a response
        let mut received = Vec::new();
        let _ = client.read_to_end(&mut received);
        assert!(received.is_empty());
    }
}
