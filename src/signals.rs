// ABOUTME: SIGINT/SIGTERM install a graceful-shutdown handler; SIGPIPE is ignored process-wide
// ABOUTME: A second SIGINT/SIGTERM after the first is a logged no-op, matching idempotent shutdown

use std::sync::Arc;
use std::thread;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::info;

use crate::hub::FrameHub;

/// Spawns a background thread that shuts `hub` down on the first
/// `SIGINT`/`SIGTERM` it observes and logs-and-ignores any further one.
/// Also ignores `SIGPIPE` process-wide so a write to a closed client
/// socket surfaces as an `EPIPE`-shaped I/O error instead of killing the
/// process.
pub fn install(hub: Arc<FrameHub>) -> std::io::Result<()> {
    ignore_sigpipe();

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::spawn(move || {
        for _ in signals.forever() {
            if hub.is_running() {
                info!("shutting down");
                hub.shutdown();
            } else {
                info!("interrupt already received, ignoring signal");
            }
        }
    });
    Ok(())
}

#[cfg(unix)]
fn ignore_sigpipe() {
    // SAFETY: installing SIG_IGN for SIGPIPE at startup, before any other
    // thread exists, is the standard way to make write() return EPIPE
    // instead of terminating the process.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(not(unix))]
fn ignore_sigpipe() {}
