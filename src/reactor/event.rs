use libc::{EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT, EPOLLRDHUP, epoll_event};
use std::os::unix::io::RawFd;

/// Readiness kinds a registration asks to be notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    pub read: bool,
    pub write: bool,
}

impl Interest {
    /// Registered, but only errors and hang-ups are reported.
    pub const NONE: Self = Self {
        read: false,
        write: false,
    };
    pub const READABLE: Self = Self {
        read: true,
        write: false,
    };
    pub const WRITABLE: Self = Self {
        read: false,
        write: true,
    };
    pub const BOTH: Self = Self {
        read: true,
        write: true,
    };

    pub(crate) fn to_epoll(self) -> u32 {
        let mut bits = 0;

        if self.read {
            bits |= (EPOLLIN | EPOLLRDHUP) as u32;
        }

        if self.write {
            bits |= EPOLLOUT as u32;
        }

        bits
    }
}

/// One readiness notification returned by [`Poller::wait`].
///
/// [`Poller::wait`]: crate::reactor::poller::Poller::wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    fd: RawFd,
    bits: u32,
}

impl Event {
    pub(crate) fn from_raw(raw: &epoll_event) -> Self {
        // epoll_event is packed on x86_64, copy the fields out
        let bits = raw.events;
        let data = raw.u64;

        Self {
            fd: data as RawFd,
            bits,
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn is_readable(&self) -> bool {
        self.bits & (EPOLLIN | EPOLLRDHUP | EPOLLHUP) as u32 != 0
    }

    pub fn is_writable(&self) -> bool {
        self.bits & EPOLLOUT as u32 != 0
    }

    pub fn is_error(&self) -> bool {
        self.bits & EPOLLERR as u32 != 0
    }
}

/// Reusable buffer that [`Poller::wait`] fills with ready events.
///
/// [`Poller::wait`]: crate::reactor::poller::Poller::wait
pub struct Events {
    raw: Vec<epoll_event>,
    len: usize,
}

impl Events {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            raw: vec![epoll_event { events: 0, u64: 0 }; capacity],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.raw.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<Event> {
        self.raw[..self.len].get(index).map(Event::from_raw)
    }

    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.raw[..self.len].iter().map(Event::from_raw)
    }

    pub(crate) fn raw_mut(&mut self) -> &mut [epoll_event] {
        &mut self.raw
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        self.len = len.min(self.raw.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(fd: RawFd, bits: i32) -> epoll_event {
        epoll_event {
            events: bits as u32,
            u64: fd as u64,
        }
    }

    #[test]
    fn interest_bits() {
        assert_eq!(Interest::NONE.to_epoll(), 0);
        assert_eq!(Interest::WRITABLE.to_epoll(), EPOLLOUT as u32);
        assert_ne!(Interest::READABLE.to_epoll() & EPOLLIN as u32, 0);
        assert_eq!(
            Interest::BOTH.to_epoll(),
            Interest::READABLE.to_epoll() | Interest::WRITABLE.to_epoll()
        );
    }

    #[test]
    fn event_decodes_fd_and_readiness() {
        let event = Event::from_raw(&raw(17, EPOLLIN | EPOLLOUT));
        assert_eq!(event.fd(), 17);
        assert!(event.is_readable());
        assert!(event.is_writable());
        assert!(!event.is_error());

        let hangup = Event::from_raw(&raw(3, EPOLLHUP));
        assert!(hangup.is_readable());
        assert!(!hangup.is_writable());

        let error = Event::from_raw(&raw(4, EPOLLERR));
        assert!(error.is_error());
    }

    #[test]
    fn events_only_yield_filled_entries() {
        let mut events = Events::with_capacity(4);
        assert!(events.is_empty());

        events.raw_mut()[0] = raw(5, EPOLLIN);
        events.raw_mut()[1] = raw(6, EPOLLOUT);
        events.set_len(2);

        let fds: Vec<RawFd> = events.iter().map(|e| e.fd()).collect();
        assert_eq!(fds, vec![5, 6]);
        assert_eq!(events.get(1).map(|e| e.fd()), Some(6));
        assert!(events.get(2).is_none());

        events.set_len(99);
        assert_eq!(events.len(), 4);
    }
}
