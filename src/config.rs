//! Server configuration.
//!
//! Every option can be given as a command-line flag or through a
//! `POLLSERVE_*` environment variable.
//!
//! ```bash
//! pollserve --bind-port 9000 --max-connections 64
//! POLLSERVE_BIND_PORT=9000 pollserve
//! ```

use crate::error::ConfigError;

use clap::Parser;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BACKLOG: i32 = 10;
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;
pub const DEFAULT_IDLE_WAIT_TIMEOUT_MS: u64 = 10;
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 1_000;
pub const DEFAULT_RESPONSE_BODY: &str = "Hello world!";

/// Largest accepted `max_connections`; slots, event buffer and epoll hint scale with it.
pub const MAX_CONNECTIONS_LIMIT: usize = 1 << 20;
/// Largest accepted `read_buffer_size`.
pub const READ_BUFFER_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Parser)]
#[command(name = "pollserve")]
#[command(about = "Single-threaded epoll server answering every connection with a fixed response")]
#[command(version)]
pub struct ServerConfig {
    /// IPv4 address to bind the listener to
    #[arg(long, default_value_t = Ipv4Addr::LOCALHOST, env = "POLLSERVE_BIND_ADDRESS")]
    pub bind_address: Ipv4Addr,

    /// Port to listen on (0 picks an ephemeral port)
    #[arg(long, default_value_t = DEFAULT_PORT, env = "POLLSERVE_BIND_PORT")]
    pub bind_port: u16,

    /// Listen backlog handed to the kernel
    #[arg(long, default_value_t = DEFAULT_BACKLOG, env = "POLLSERVE_BACKLOG")]
    pub backlog: i32,

    /// Maximum number of connections served at once
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "POLLSERVE_MAX_CONNECTIONS")]
    pub max_connections: usize,

    /// Size of the scratch buffer used to read (and discard) requests
    #[arg(long, default_value_t = DEFAULT_READ_BUFFER_SIZE, env = "POLLSERVE_READ_BUFFER_SIZE")]
    pub read_buffer_size: usize,

    /// Upper bound on a single readiness wait, in milliseconds
    #[arg(long, default_value_t = DEFAULT_IDLE_WAIT_TIMEOUT_MS, env = "POLLSERVE_IDLE_WAIT_TIMEOUT_MS")]
    pub idle_wait_timeout_ms: u64,

    /// Close connections that have not finished after this many milliseconds (0 disables)
    #[arg(long, default_value_t = DEFAULT_CONNECTION_TIMEOUT_MS, env = "POLLSERVE_CONNECTION_TIMEOUT_MS")]
    pub connection_timeout_ms: u64,

    /// How long shutdown waits for in-flight connections, in milliseconds
    #[arg(long, default_value_t = DEFAULT_SHUTDOWN_GRACE_MS, env = "POLLSERVE_SHUTDOWN_GRACE_MS")]
    pub shutdown_grace_ms: u64,

    /// Body of the fixed response
    #[arg(long, default_value = DEFAULT_RESPONSE_BODY, env = "POLLSERVE_RESPONSE_BODY")]
    pub response_body: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", env = "POLLSERVE_LOG_LEVEL")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: Ipv4Addr::LOCALHOST,
            bind_port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            idle_wait_timeout_ms: DEFAULT_IDLE_WAIT_TIMEOUT_MS,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            response_body: DEFAULT_RESPONSE_BODY.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Socket address the listener binds to.
    pub fn address(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.bind_address, self.bind_port)
    }

    pub fn idle_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_wait_timeout_ms)
    }

    /// Per-connection deadline, `None` when disabled.
    pub fn connection_timeout(&self) -> Option<Duration> {
        (self.connection_timeout_ms > 0).then(|| Duration::from_millis(self.connection_timeout_ms))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::NoConnections);
        }

        if self.max_connections > MAX_CONNECTIONS_LIMIT {
            return Err(ConfigError::TooManyConnections {
                requested: self.max_connections,
                limit: MAX_CONNECTIONS_LIMIT,
            });
        }

        if self.backlog < 1 {
            return Err(ConfigError::Backlog(self.backlog));
        }

        if self.read_buffer_size == 0 {
            return Err(ConfigError::EmptyReadBuffer);
        }

        if self.read_buffer_size > READ_BUFFER_LIMIT {
            return Err(ConfigError::ReadBufferTooLarge {
                requested: self.read_buffer_size,
                limit: READ_BUFFER_LIMIT,
            });
        }

        if self.idle_wait_timeout_ms > i32::MAX as u64 {
            return Err(ConfigError::WaitTimeout(self.idle_wait_timeout_ms));
        }

        Ok(())
    }
}
