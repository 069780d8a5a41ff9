use std::sync::Mutex;

use nix::sys::signal::{self, SigHandler, Signal};

use crate::plugin::CancellationToken;

static CANCEL: Mutex<Option<CancellationToken>> = Mutex::new(None);

/// Keeps SIGINT/SIGTERM routed to a token; restores the default
/// disposition when dropped.
#[must_use = "the handler is removed when the guard is dropped"]
pub struct CancelGuard {
    _private: (),
}

/// Cancel `token` on SIGINT or SIGTERM until the returned guard is dropped.
///
/// A later install replaces the token.
pub fn install_cancel_handler(token: CancellationToken) -> nix::Result<CancelGuard> {
    *CANCEL.lock().unwrap_or_else(|e| e.into_inner()) = Some(token);

    // SAFETY: the handler only performs an atomic store.
    unsafe {
        signal::signal(Signal::SIGINT, SigHandler::Handler(handle_cancel))?;
        signal::signal(Signal::SIGTERM, SigHandler::Handler(handle_cancel))?;
    }

    Ok(CancelGuard { _private: () })
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        // SAFETY: restoring the default disposition installs no Rust code.
        unsafe {
            let _ = signal::signal(Signal::SIGINT, SigHandler::SigDfl);
            let _ = signal::signal(Signal::SIGTERM, SigHandler::SigDfl);
        }
        *CANCEL.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

extern "C" fn handle_cancel(_: i32) {
    // never block inside a signal handler
    if let Ok(slot) = CANCEL.try_lock() {
        if let Some(token) = slot.as_ref() {
            token.cancel();
        }
    }
}
