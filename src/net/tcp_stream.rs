use libc::{
    MSG_NOSIGNAL, SHUT_WR, SO_ERROR, SOL_SOCKET, c_void, close, getsockopt, read, send, shutdown,
    socklen_t,
};
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};

/// An accepted, non-blocking TCP connection. Closes its descriptor on drop.
pub struct TcpStream {
    file_descriptor: RawFd,
    peer: SocketAddr,
}

impl TcpStream {
    pub(crate) fn new(file_descriptor: RawFd, peer: SocketAddr) -> Self {
        Self {
            file_descriptor,
            peer,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Single non-blocking read; `WouldBlock` surfaces as an error of that kind.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let res = unsafe { read(self.file_descriptor, buf.as_mut_ptr() as *mut c_void, buf.len()) };

        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(res as usize)
    }

    /// Single non-blocking write. A closed peer yields `EPIPE` instead of `SIGPIPE`.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let res = unsafe {
            send(
                self.file_descriptor,
                buf.as_ptr() as *const c_void,
                buf.len(),
                MSG_NOSIGNAL,
            )
        };

        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(res as usize)
    }

    /// Pending socket error (`SO_ERROR`), clearing it.
    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        let mut code: i32 = 0;
        let mut length = mem::size_of::<i32>() as socklen_t;

        let ret = unsafe {
            getsockopt(
                self.file_descriptor,
                SOL_SOCKET,
                SO_ERROR,
                &mut code as *mut i32 as *mut c_void,
                &mut length,
            )
        };

        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok((code != 0).then(|| io::Error::from_raw_os_error(code)))
    }

    pub fn shutdown_write(&self) -> io::Result<()> {
        let ret = unsafe { shutdown(self.file_descriptor, SHUT_WR) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }
}

impl AsRawFd for TcpStream {
    fn as_raw_fd(&self) -> RawFd {
        self.file_descriptor
    }
}

impl Drop for TcpStream {
    fn drop(&mut self) {
        unsafe {
            close(self.file_descriptor);
        }
    }
}
