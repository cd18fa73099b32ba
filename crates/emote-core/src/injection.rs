//! Synthetic delete-and-insert replacement.
//!
//! Every event sent from here carries the [`InjectionMarker`] and is produced
//! while an [`InjectionScope`] is open. Taps that can read the marker back use
//! it directly. The others ask the shared [`InjectionGuard`] whether a scope is
//! open (or closed only moments ago) and stamp the incoming event themselves.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use enigo::Enigo;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::clipboard::{set_clipboard_text, ClipboardSnapshot};
use crate::error::{EmoteError, Result};
use crate::keyboard::{create_keyboard_controller, send_backspace, send_paste_chord, type_text};
use crate::settings::{InsertionStrategy, Settings};
use crate::snapshot::Snapshot;

/// Provenance tag carried by synthetic input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InjectionMarker(i64);

/// "EMOT"
pub const INJECTION_MARKER: InjectionMarker = InjectionMarker(0x454D_4F54);

impl InjectionMarker {
    pub const fn value(self) -> i64 {
        self.0
    }
}

/// Tracks whether synthetic input is in flight.
#[derive(Debug)]
pub struct InjectionGuard {
    epoch: Instant,
    in_flight: AtomicUsize,
    quiet_until_ms: AtomicU64,
}

impl InjectionGuard {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            in_flight: AtomicUsize::new(0),
            quiet_until_ms: AtomicU64::new(0),
        }
    }

    /// Open a scope. Events seen until `grace` after the scope closes are
    /// considered ours.
    pub fn begin(&self, grace: Duration) -> InjectionScope<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InjectionScope { guard: self, grace }
    }

    /// The marker for an event arriving now, if it must be one of ours.
    pub fn stamp(&self) -> Option<InjectionMarker> {
        let active = self.in_flight.load(Ordering::SeqCst) > 0
            || self.now_ms() < self.quiet_until_ms.load(Ordering::SeqCst);
        active.then_some(INJECTION_MARKER)
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

impl Default for InjectionGuard {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InjectionScope<'a> {
    guard: &'a InjectionGuard,
    grace: Duration,
}

impl Drop for InjectionScope<'_> {
    fn drop(&mut self) {
        let until = self.guard.now_ms() + self.grace.as_millis() as u64;
        self.guard.quiet_until_ms.fetch_max(until, Ordering::SeqCst);
        self.guard.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Why a replacement did not fully land.
#[derive(Debug, Error)]
pub enum InjectionError {
    /// Nothing reached the target; the typed trigger is intact.
    #[error("nothing was sent: {0}")]
    NotSent(EmoteError),
    /// Some or all of the trigger was erased but the replacement is missing.
    #[error("trigger erased without a replacement: {0}")]
    Partial(EmoteError),
}

impl InjectionError {
    pub fn nothing_sent(&self) -> bool {
        matches!(self, Self::NotSent(_))
    }
}

/// Erases typed text and inserts a replacement.
pub trait Injector {
    /// Send `delete_count` backspaces, then insert `replacement`.
    fn replace(
        &mut self,
        delete_count: usize,
        replacement: &str,
    ) -> std::result::Result<(), InjectionError>;
}

/// Injector driving the OS through enigo and arboard.
pub struct EnigoInjector {
    settings: Arc<Snapshot<Settings>>,
    guard: Arc<InjectionGuard>,
    runtime: Option<Handle>,
}

impl EnigoInjector {
    pub fn new(settings: Arc<Snapshot<Settings>>, guard: Arc<InjectionGuard>) -> Self {
        Self {
            settings,
            guard,
            runtime: None,
        }
    }

    /// Schedule clipboard restores on this runtime instead of a helper thread.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Paste `text`, typing it when the clipboard or the chord lets us down.
    fn paste(&self, keyboard: &mut Enigo, text: &str, delay: Duration) -> Result<()> {
        let snapshot = match ClipboardSnapshot::capture() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "clipboard unavailable, typing replacement instead");
                return type_text(keyboard, text);
            }
        };

        if let Err(e) = set_clipboard_text(text) {
            warn!(error = %e, "could not stage replacement, typing it instead");
            self.schedule_restore(snapshot, Duration::ZERO);
            return type_text(keyboard, text);
        }

        if let Err(e) = send_paste_chord(keyboard) {
            warn!(error = %e, "paste chord failed, typing replacement instead");
            self.schedule_restore(snapshot, Duration::ZERO);
            return type_text(keyboard, text);
        }

        self.schedule_restore(snapshot, delay);
        Ok(())
    }

    /// Restore the clipboard later without blocking the event thread.
    fn schedule_restore(&self, snapshot: ClipboardSnapshot, delay: Duration) {
        let restore = move || {
            if let Err(e) = snapshot.restore() {
                warn!(error = %e, "failed to restore clipboard");
            }
        };

        match &self.runtime {
            Some(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tokio::task::spawn_blocking(restore).await;
                });
            }
            None => {
                thread::spawn(move || {
                    thread::sleep(delay);
                    restore();
                });
            }
        }
    }
}

impl Injector for EnigoInjector {
    fn replace(
        &mut self,
        delete_count: usize,
        replacement: &str,
    ) -> std::result::Result<(), InjectionError> {
        let settings = self.settings.load();
        let _scope = self.guard.begin(settings.injection_grace());

        let mut keyboard =
            create_keyboard_controller(INJECTION_MARKER).map_err(InjectionError::NotSent)?;

        for sent in 0..delete_count {
            if let Err(e) = send_backspace(&mut keyboard, 1) {
                return Err(if sent == 0 {
                    InjectionError::NotSent(e)
                } else {
                    InjectionError::Partial(e)
                });
            }
        }

        let inserted = match settings.insertion {
            InsertionStrategy::Unicode => type_text(&mut keyboard, replacement),
            InsertionStrategy::Paste => {
                self.paste(&mut keyboard, replacement, settings.clipboard_restore_delay())
            }
        };
        inserted.map_err(|e| {
            if delete_count == 0 {
                InjectionError::NotSent(e)
            } else {
                InjectionError::Partial(e)
            }
        })?;

        debug!(delete_count, strategy = ?settings.insertion, "replacement injected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_guard_stamps_nothing() {
        let guard = InjectionGuard::new();
        assert_eq!(guard.stamp(), None);
    }

    #[test]
    fn open_scope_stamps_events() {
        let guard = InjectionGuard::new();
        let scope = guard.begin(Duration::ZERO);
        assert_eq!(guard.stamp(), Some(INJECTION_MARKER));
        drop(scope);
    }

    #[test]
    fn grace_window_outlives_the_scope() {
        let guard = InjectionGuard::new();
        drop(guard.begin(Duration::from_secs(60)));
        assert_eq!(guard.stamp(), Some(INJECTION_MARKER));
    }

    #[test]
    fn stamping_stops_after_grace() {
        let guard = InjectionGuard::new();
        drop(guard.begin(Duration::from_millis(20)));
        thread::sleep(Duration::from_millis(60));
        assert_eq!(guard.stamp(), None);
    }

    #[test]
    fn nested_scopes_keep_stamping_until_last_closes() {
        let guard = InjectionGuard::new();
        let outer = guard.begin(Duration::ZERO);
        drop(guard.begin(Duration::ZERO));
        assert!(guard.stamp().is_some());
        drop(outer);
    }

    #[test]
    fn only_unsent_failures_leave_the_trigger() {
        let unsent = InjectionError::NotSent(EmoteError::Enigo("no event source".into()));
        let partial = InjectionError::Partial(EmoteError::Enigo("text rejected".into()));
        assert!(unsent.nothing_sent());
        assert!(!partial.nothing_sent());
    }
}
