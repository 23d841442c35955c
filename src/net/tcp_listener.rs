//! Non-blocking TCP listener.
//!
//! # Usage
//!
//! ```ignore
//! use pollserve::net::tcp_listener::TcpListener;
//!
//! let listener = TcpListener::bind("127.0.0.1".parse()?, 8080, 10)?;
//! match listener.accept_one() {
//!     Ok((stream, peer)) => println!("New connection from {}", peer),
//!     Err(AcceptError::WouldBlock) => {}
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```
use crate::error::{AcceptError, StartupError};
use crate::net::tcp_stream::TcpStream;
use crate::net::utils::{sockaddr_to_socketaddr, socketaddr_to_sockaddr};

use libc::{
    AF_INET, SO_REUSEADDR, SOCK_CLOEXEC, SOCK_NONBLOCK, SOCK_STREAM, SOL_SOCKET, accept4, bind,
    c_void, close, getsockname, listen, setsockopt, sockaddr, sockaddr_in, socket, socklen_t,
};
use std::io;
use std::mem;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::unix::io::{AsRawFd, RawFd};

/// A bound, listening TCP socket.
///
/// The socket is non-blocking: [`Self::accept_one`] never waits, it reports
/// [`AcceptError::WouldBlock`] when nothing is pending.
pub struct TcpListener {
    file_descriptor: RawFd,
}

impl TcpListener {
    /// Binds a listener to `address:port`.
    ///
    /// This method performs the following:
    /// 1. Creates a non-blocking, close-on-exec socket
    /// 2. Enables `SO_REUSEADDR` so a restart can reuse the port
    /// 3. Binds to the specified address
    /// 4. Starts listening with the given backlog
    ///
    /// # Arguments
    /// * `address` - IPv4 address to bind to
    /// * `port` - Port to bind to, `0` lets the kernel choose
    /// * `backlog` - Length of the kernel's pending-connection queue
    ///
    /// # Returns
    /// A [`TcpListener`] on success, or the [`StartupError`] naming the failed step
    pub fn bind(address: Ipv4Addr, port: u16, backlog: i32) -> Result<Self, StartupError> {
        let file_descriptor =
            unsafe { socket(AF_INET, SOCK_STREAM | SOCK_NONBLOCK | SOCK_CLOEXEC, 0) };
        if file_descriptor < 0 {
            return Err(StartupError::Socket(io::Error::last_os_error()));
        }

        // owns the descriptor from here on, so every early return closes it
        let listener = Self { file_descriptor };

        let enable: i32 = 1;
        let ret = unsafe {
            setsockopt(
                file_descriptor,
                SOL_SOCKET,
                SO_REUSEADDR,
                &enable as *const i32 as *const c_void,
                mem::size_of::<i32>() as socklen_t,
            )
        };
        if ret < 0 {
            return Err(StartupError::Socket(io::Error::last_os_error()));
        }

        let target = SocketAddrV4::new(address, port);
        let raw = socketaddr_to_sockaddr(&target);
        let ret = unsafe {
            bind(
                file_descriptor,
                &raw as *const sockaddr_in as *const sockaddr,
                mem::size_of::<sockaddr_in>() as socklen_t,
            )
        };
        if ret < 0 {
            return Err(StartupError::Bind {
                address: target,
                source: io::Error::last_os_error(),
            });
        }

        let ret = unsafe { listen(file_descriptor, backlog) };
        if ret < 0 {
            return Err(StartupError::Listen {
                backlog,
                source: io::Error::last_os_error(),
            });
        }

        Ok(listener)
    }

    /// Accepts one pending connection without blocking.
    ///
    /// # Returns
    /// The non-blocking [`TcpStream`] and the peer's address,
    /// [`AcceptError::WouldBlock`] on a spurious wakeup, or [`AcceptError::Os`].
    pub fn accept_one(&self) -> Result<(TcpStream, SocketAddr), AcceptError> {
        let mut addr: sockaddr_in = unsafe { mem::zeroed() };
        let mut addr_len = mem::size_of::<sockaddr_in>() as socklen_t;

        loop {
            let client = unsafe {
                accept4(
                    self.file_descriptor,
                    &mut addr as *mut sockaddr_in as *mut sockaddr,
                    &mut addr_len,
                    SOCK_NONBLOCK | SOCK_CLOEXEC,
                )
            };

            if client >= 0 {
                let peer = sockaddr_to_socketaddr(&addr);
                return Ok((TcpStream::new(client, peer), peer));
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => return Err(AcceptError::WouldBlock),
                // the peer gave up before we got to it
                io::ErrorKind::ConnectionAborted => return Err(AcceptError::WouldBlock),
                _ => return Err(AcceptError::Os(err)),
            }
        }
    }

    /// Returns the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        let mut addr: sockaddr_in = unsafe { mem::zeroed() };
        let mut length = mem::size_of::<sockaddr_in>() as socklen_t;
        let result = unsafe {
            getsockname(
                self.file_descriptor,
                &mut addr as *mut sockaddr_in as *mut sockaddr,
                &mut length,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(sockaddr_to_socketaddr(&addr))
    }
}

impl AsRawFd for TcpListener {
    fn as_raw_fd(&self) -> RawFd {
        self.file_descriptor
    }
}

impl Drop for TcpListener {
    fn drop(&mut self) {
        unsafe {
            close(self.file_descriptor);
        }
    }
}
