//! Cooperative shutdown.
//!
//! [`Shutdown`] is a cloneable flag the event loop checks once per iteration.
//! [`install`] wires SIGINT and SIGTERM to it; the handler only stores to an
//! atomic.

use crate::error::StartupError;

use libc::{SIG_ERR, SIGINT, SIGTERM, c_int, sighandler_t, signal};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

static SIGNALLED: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown. Safe to call from any thread, any number of times.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

extern "C" fn on_signal(_signal: c_int) {
    if let Some(flag) = SIGNALLED.get() {
        flag.store(true, Ordering::SeqCst);
    }
}

/// Routes SIGINT and SIGTERM to `shutdown`.
///
/// Signals reach one flag per process. Calling again with a clone of the
/// first handle reinstalls the handlers; any other handle is rejected with
/// [`StartupError::SignalsClaimed`].
pub fn install(shutdown: &Shutdown) -> Result<(), StartupError> {
    let wired = SIGNALLED.get_or_init(|| shutdown.flag.clone());
    if !Arc::ptr_eq(wired, &shutdown.flag) {
        return Err(StartupError::SignalsClaimed);
    }

    for sig in [SIGINT, SIGTERM] {
        let previous = unsafe { signal(sig, on_signal as extern "C" fn(c_int) as sighandler_t) };
        if previous == SIG_ERR {
            return Err(StartupError::Signal {
                signal: sig,
                source: io::Error::last_os_error(),
            });
        }
    }

    debug!("signal handlers installed");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_is_visible_through_clones() {
        let shutdown = Shutdown::new();
        let clone = shutdown.clone();
        assert!(!clone.is_triggered());

        shutdown.trigger();
        assert!(clone.is_triggered());

        shutdown.trigger();
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn only_the_first_handle_receives_signals() {
        let shutdown = Shutdown::new();
        install(&shutdown).expect("first install");
        install(&shutdown.clone()).expect("reinstall for the same flag");

        let other = Shutdown::new();
        assert!(matches!(install(&other), Err(StartupError::SignalsClaimed)));
    }
}
