//! Error types for the server.
//!
//! Failures fall into two tiers. [`StartupError`] and [`WaitError`] end the
//! process (see [`ServerError::exit_code`]); [`ConnectionError`] only ever
//! closes the connection it came from. [`AdmissionError`] and transient I/O
//! conditions are absorbed where they happen.

use std::io;
use std::net::SocketAddrV4;
use std::os::unix::io::RawFd;

use thiserror::Error;

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_connections must be at least 1")]
    NoConnections,

    #[error("max_connections {requested} exceeds the limit of {limit}")]
    TooManyConnections { requested: usize, limit: usize },

    #[error("backlog must be at least 1, got {0}")]
    Backlog(i32),

    #[error("read_buffer_size must be at least 1")]
    EmptyReadBuffer,

    #[error("read_buffer_size {requested} exceeds the limit of {limit} bytes")]
    ReadBufferTooLarge { requested: usize, limit: usize },

    #[error("idle_wait_timeout_ms {0} does not fit an epoll timeout")]
    WaitTimeout(u64),
}

/// Failures while bringing the server up. None of these are retried.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to create readiness facility")]
    Poller(#[from] PollerError),

    #[error("failed to create socket")]
    Socket(#[source] io::Error),

    #[error("failed to bind to {address}")]
    Bind {
        address: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("failed to listen with backlog {backlog}")]
    Listen {
        backlog: i32,
        #[source]
        source: io::Error,
    },

    #[error("failed to register listener")]
    Register(#[source] RegistrationError),

    #[error("failed to install handler for signal {signal}")]
    Signal {
        signal: i32,
        #[source]
        source: io::Error,
    },

    #[error("signal handlers already route to another shutdown handle")]
    SignalsClaimed,

    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("epoll_create1 failed")]
    Init(#[source] io::Error),
}

/// Registration changes rejected by the readiness facility.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Deregistering something that was never registered is a logic error.
    #[error("fd {0} is not registered")]
    NotRegistered(RawFd),

    #[error("epoll_ctl rejected fd {fd}")]
    Os {
        fd: RawFd,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
#[error("epoll_wait failed")]
pub struct WaitError(#[source] pub io::Error);

/// Reasons a connection could not be admitted into the slot table.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("slot table is full ({capacity} connections)")]
    AtCapacity { capacity: usize },

    #[error("fd {0} already has a slot")]
    Duplicate(RawFd),
}

/// Outcome of a single non-blocking accept attempt.
#[derive(Debug, Error)]
pub enum AcceptError {
    /// Readiness was reported but no connection was pending.
    #[error("no pending connection")]
    WouldBlock,

    #[error("accept failed")]
    Os(#[source] io::Error),
}

/// Failures scoped to one established connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("read failed")]
    Read(#[source] io::Error),

    #[error("write failed")]
    Write(#[source] io::Error),

    #[error("socket reported an error")]
    Socket(#[source] io::Error),

    #[error("not completed within {0} ms")]
    TimedOut(u64),

    #[error("server shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error("listener registration lost")]
    Listener(#[source] RegistrationError),
}

impl ServerError {
    /// Process exit code for this failure class.
    ///
    /// `0` is reserved for a clean shutdown and `1` is never produced.
    pub fn exit_code(&self) -> u8 {
        match self {
            ServerError::Startup(StartupError::Config(_)) => 2,
            ServerError::Startup(StartupError::Poller(_)) => 3,
            ServerError::Startup(StartupError::Socket(_) | StartupError::Bind { .. }) => 4,
            ServerError::Startup(StartupError::Listen { .. }) => 5,
            ServerError::Startup(
                StartupError::Register(_)
                | StartupError::Signal { .. }
                | StartupError::SignalsClaimed
                | StartupError::Logging(_),
            ) => 6,
            ServerError::Listener(_) => 6,
            ServerError::Wait(_) => 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_per_failure_class() {
        let config: ServerError = StartupError::from(ConfigError::NoConnections).into();
        assert_eq!(config.exit_code(), 2);

        let poller: ServerError =
            StartupError::from(PollerError::Init(io::Error::from_raw_os_error(libc::EMFILE)))
                .into();
        assert_eq!(poller.exit_code(), 3);

        let bind: ServerError = StartupError::Bind {
            address: "127.0.0.1:8080".parse().unwrap(),
            source: io::Error::from_raw_os_error(libc::EADDRINUSE),
        }
        .into();
        assert_eq!(bind.exit_code(), 4);

        let listen: ServerError = StartupError::Listen {
            backlog: 10,
            source: io::Error::from_raw_os_error(libc::EINVAL),
        }
        .into();
        assert_eq!(listen.exit_code(), 5);

        let claimed: ServerError = StartupError::SignalsClaimed.into();
        assert_eq!(claimed.exit_code(), 6);

        let wait: ServerError = WaitError(io::Error::from_raw_os_error(libc::EBADF)).into();
        assert_eq!(wait.exit_code(), 7);
    }

    #[test]
    fn messages_name_the_failure() {
        let err = AdmissionError::AtCapacity { capacity: 10 };
        assert_eq!(err.to_string(), "slot table is full (10 connections)");

        let err = RegistrationError::NotRegistered(42);
        assert_eq!(err.to_string(), "fd 42 is not registered");

        let err = ConnectionError::TimedOut(5000);
        assert_eq!(err.to_string(), "not completed within 5000 ms");
    }
}
