// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Quit requests, polled by the control loop once per tick

use log::debug;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set from the signal handler
static OS_QUIT_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Handle to request and observe termination of a run
///
/// Clones share the same flag. A handle created with [QuitSignal::with_os_signals] also
/// reports SIGINT and SIGTERM.
#[derive(Debug, Clone, Default)]
pub struct QuitSignal {
    requested: Arc<AtomicBool>,
    observe_os: bool,
}

impl QuitSignal {
    /// Create a handle that is only triggered programmatically
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle that is also triggered by SIGINT and SIGTERM
    pub fn with_os_signals() -> io::Result<Self> {
        install_os_handlers()?;
        Ok(Self {
            requested: Arc::default(),
            observe_os: true,
        })
    }

    /// Request termination
    pub fn request(&self) {
        self.requested.store(true, Ordering::Relaxed);
    }

    /// Whether termination has been requested
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
            || (self.observe_os && OS_QUIT_REQUESTED.load(Ordering::Relaxed))
    }
}

extern "C" fn on_quit_signal(_signal: libc::c_int) {
    // Only async-signal-safe operations here
    OS_QUIT_REQUESTED.store(true, Ordering::Relaxed);
}

fn install_os_handlers() -> io::Result<()> {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        let handler = on_quit_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        // SAFETY: The handler only stores to a static atomic which is async-signal-safe.
        let previous = unsafe { libc::signal(signal, handler) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    debug!("Installed handlers for SIGINT and SIGTERM");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_is_shared_by_clones() {
        let quit = QuitSignal::new();
        let observer = quit.clone();
        assert!(!observer.is_requested());
        quit.request();
        assert!(observer.is_requested());
    }

    #[test]
    fn programmatic_handle_ignores_os_flag() {
        let quit = QuitSignal::new();
        OS_QUIT_REQUESTED.store(true, Ordering::Relaxed);
        let unaffected = !quit.is_requested();
        OS_QUIT_REQUESTED.store(false, Ordering::Relaxed);
        assert!(unaffected);
    }
}
