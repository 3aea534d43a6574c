use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::log_debug;

/// Flag set by the SIGINT/SIGTERM handler to request shutdown.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Signal handler for shutdown requests.
///
/// Sets a flag that the resident loop checks before closing the tunnel.
/// Only uses atomic operations (async-signal-safe).
extern "C" fn handle_shutdown(_: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM through the shutdown latch.
pub fn install_shutdown_handler() -> Result<()> {
    unsafe {
        // SAFETY: handle_shutdown is an extern "C" signal handler with no side
        // effects beyond flipping an atomic flag, which is async-signal-safe.
        let handler = handle_shutdown as *const () as libc::sighandler_t;
        if libc::signal(libc::SIGINT, handler) == libc::SIG_ERR {
            log_debug("failed to install SIGINT handler");
            return Err(anyhow!("failed to install SIGINT handler"));
        }
        if libc::signal(libc::SIGTERM, handler) == libc::SIG_ERR {
            log_debug("failed to install SIGTERM handler");
            return Err(anyhow!("failed to install SIGTERM handler"));
        }
    }
    Ok(())
}

/// True once a shutdown signal has arrived. The flag stays latched so the
/// tunnel is closed exactly once no matter how many signals land.
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(any(test, feature = "mutants"))]
pub fn reset_shutdown_flag() {
    SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};
    use std::thread;
    use std::time::Duration;

    fn signal_test_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn handler_latches_flag() {
        let _guard = signal_test_lock().lock().unwrap();
        reset_shutdown_flag();
        handle_shutdown(0);
        assert!(shutdown_requested());
        // A second signal leaves the latch set.
        handle_shutdown(0);
        assert!(shutdown_requested());
        reset_shutdown_flag();
    }

    #[test]
    fn install_shutdown_handler_catches_sigterm() {
        let _guard = signal_test_lock().lock().unwrap();
        reset_shutdown_flag();
        install_shutdown_handler().expect("install shutdown handler");
        unsafe {
            // SAFETY: raising SIGTERM in-process is used for test validation only.
            libc::raise(libc::SIGTERM);
        }
        for _ in 0..20 {
            if shutdown_requested() {
                reset_shutdown_flag();
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("SIGTERM was not latched");
    }
}
