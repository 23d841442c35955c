use crate::error::{PollerError, RegistrationError, WaitError};
use crate::reactor::event::{Events, Interest};

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, close, epoll_create1, epoll_ctl,
    epoll_event, epoll_wait,
};
use std::collections::HashSet;
use std::io;
use std::os::unix::io::RawFd;
use std::ptr;
use std::time::{Duration, Instant};
use tracing::trace;

/// Owned epoll instance plus the set of descriptors registered with it.
///
/// The poller never owns the registered descriptors; callers must
/// [`deregister`](Self::deregister) before closing one.
pub struct Poller {
    epoll: RawFd,
    registered: HashSet<RawFd>,
}

impl Poller {
    /// Creates a new epoll instance.
    ///
    /// # Arguments
    /// * `capacity_hint` - Expected number of registrations, used to size bookkeeping
    pub fn new(capacity_hint: usize) -> Result<Self, PollerError> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(PollerError::Init(io::Error::last_os_error()));
        }

        Ok(Self {
            epoll,
            registered: HashSet::with_capacity(capacity_hint),
        })
    }

    /// Registers `fd` with the given interest, or updates an existing registration.
    pub fn register(&mut self, fd: RawFd, interest: Interest) -> Result<(), RegistrationError> {
        let op = if self.registered.contains(&fd) {
            EPOLL_CTL_MOD
        } else {
            EPOLL_CTL_ADD
        };

        let mut event = epoll_event {
            events: interest.to_epoll(),
            u64: fd as u64,
        };

        let ret = unsafe { epoll_ctl(self.epoll, op, fd, &mut event) };
        if ret < 0 {
            return Err(RegistrationError::Os {
                fd,
                source: io::Error::last_os_error(),
            });
        }

        self.registered.insert(fd);
        trace!(fd, ?interest, "registered");

        Ok(())
    }

    /// Removes the registration for `fd`.
    pub fn deregister(&mut self, fd: RawFd) -> Result<(), RegistrationError> {
        if !self.registered.remove(&fd) {
            return Err(RegistrationError::NotRegistered(fd));
        }

        let ret = unsafe { epoll_ctl(self.epoll, EPOLL_CTL_DEL, fd, ptr::null_mut()) };
        if ret < 0 {
            return Err(RegistrationError::Os {
                fd,
                source: io::Error::last_os_error(),
            });
        }

        trace!(fd, "deregistered");

        Ok(())
    }

    pub fn is_registered(&self, fd: RawFd) -> bool {
        self.registered.contains(&fd)
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    /// Blocks until a registered descriptor is ready or `timeout` elapses.
    ///
    /// Fills `events` and returns how many were reported; `0` means the
    /// timeout elapsed. An interrupted wait is resumed with whatever time is left.
    pub fn wait(&self, events: &mut Events, timeout: Duration) -> Result<usize, WaitError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut remaining = timeout;

        loop {
            let capacity = i32::try_from(events.capacity()).unwrap_or(i32::MAX);
            let n = unsafe {
                epoll_wait(
                    self.epoll,
                    events.raw_mut().as_mut_ptr(),
                    capacity,
                    timeout_ms(remaining),
                )
            };

            if n >= 0 {
                events.set_len(n as usize);
                return Ok(n as usize);
            }

            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                events.set_len(0);
                return Err(WaitError(err));
            }

            if let Some(deadline) = deadline {
                remaining = deadline.saturating_duration_since(Instant::now());
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        unsafe {
            close(self.epoll);
        }
    }
}

/// Rounds up so a sub-millisecond remainder still waits instead of spinning.
fn timeout_ms(timeout: Duration) -> i32 {
    let ms = timeout.as_millis() + u128::from(timeout.subsec_nanos() % 1_000_000 != 0);
    ms.min(i32::MAX as u128) as i32
}
