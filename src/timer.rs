//! Ordered per-connection deadlines.
//!
//! Connections get a deadline when admitted. Each loop iteration pops the
//! expired ones and closes them; the earliest remaining deadline also bounds
//! how long the next readiness wait may block.

use std::collections::{BTreeSet, HashMap};
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

/// Deadlines ordered by instant, addressable by descriptor.
#[derive(Debug, Default)]
pub struct DeadlineQueue {
    order: BTreeSet<(Instant, RawFd)>,
    by_fd: HashMap<RawFd, Instant>,
}

impl DeadlineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deadline for `fd`, replacing any previous one.
    pub fn insert(&mut self, fd: RawFd, deadline: Instant) {
        if let Some(previous) = self.by_fd.insert(fd, deadline) {
            self.order.remove(&(previous, fd));
        }
        self.order.insert((deadline, fd));
    }

    pub fn remove(&mut self, fd: RawFd) -> Option<Instant> {
        let deadline = self.by_fd.remove(&fd)?;
        self.order.remove(&(deadline, fd));
        Some(deadline)
    }

    /// Removes and returns every descriptor whose deadline is at or before `now`.
    pub fn pop_expired(&mut self, now: Instant) -> Vec<RawFd> {
        let mut expired = Vec::new();

        while let Some(&(deadline, fd)) = self.order.first() {
            if deadline > now {
                break;
            }
            self.order.pop_first();
            self.by_fd.remove(&fd);
            expired.push(fd);
        }

        expired
    }

    /// Time left until the earliest deadline, zero if already overdue.
    pub fn next_remaining(&self, now: Instant) -> Option<Duration> {
        self.order
            .first()
            .map(|(deadline, _)| deadline.saturating_duration_since(now))
    }

    pub fn len(&self) -> usize {
        self.by_fd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fd.is_empty()
    }
}
