//! Shared phase/year state with listener fan-out.
//!
//! Single source of truth for (current phase, current season year). All
//! simulation components read through the same instance, so a phase or
//! year change is visible everywhere immediately.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::phase::SeasonPhase;

/// Callback invoked with `(old_phase, new_phase)` after a phase change.
pub type PhaseListener = Arc<dyn Fn(SeasonPhase, SeasonPhase) + Send + Sync>;

/// Token returned by [`PhaseState::add_listener`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

struct Inner {
    phase: SeasonPhase,
    season_year: i32,
}

/// Thread-safe phase/year holder.
///
/// Listener registration is safe from any thread; phase mutation is
/// expected from the season controller only. Listeners are invoked outside
/// the state lock, and a panicking listener is logged and dropped rather
/// than aborting the change.
pub struct PhaseState {
    inner: Mutex<Inner>,
    listeners: Mutex<Vec<(ListenerId, PhaseListener)>>,
    next_listener_id: AtomicU64,
}

impl PhaseState {
    pub fn new(initial_phase: SeasonPhase, season_year: i32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: initial_phase,
                season_year,
            }),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    pub fn phase(&self) -> SeasonPhase {
        self.inner.lock().unwrap().phase
    }

    pub fn season_year(&self) -> i32 {
        self.inner.lock().unwrap().season_year
    }

    /// Set the current phase. No-op when unchanged; otherwise every
    /// registered listener is notified with `(old, new)` after the lock is
    /// released.
    pub fn set_phase(&self, new_phase: SeasonPhase) {
        let old_phase = {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase == new_phase {
                return;
            }
            let old = inner.phase;
            inner.phase = new_phase;
            old
        };

        // Copy the listener list so callbacks run outside both locks.
        let listeners: Vec<PhaseListener> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(old_phase, new_phase))).is_err() {
                log::warn!(
                    "phase listener panicked during {} -> {} notification; continuing",
                    old_phase,
                    new_phase
                );
            }
        }
    }

    pub fn set_season_year(&self, new_year: i32) {
        let mut inner = self.inner.lock().unwrap();
        if inner.season_year == new_year {
            return;
        }
        log::info!(
            "season year updated: {} -> {}",
            inner.season_year,
            new_year
        );
        inner.season_year = new_year;
    }

    /// Register a phase-change listener. Returns an id for removal.
    pub fn add_listener(
        &self,
        listener: impl Fn(SeasonPhase, SeasonPhase) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().unwrap().push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.lock().unwrap().retain(|(lid, _)| *lid != id);
    }

    /// Snapshot of (phase, season year) under a single lock acquisition.
    pub fn snapshot(&self) -> (SeasonPhase, i32) {
        let inner = self.inner.lock().unwrap();
        (inner.phase, inner.season_year)
    }
}

impl std::fmt::Debug for PhaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (phase, year) = self.snapshot();
        f.debug_struct("PhaseState")
            .field("phase", &phase)
            .field("season_year", &year)
            .finish()
    }
}
