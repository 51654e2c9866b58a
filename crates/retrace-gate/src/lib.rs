//! Process-wide nestable recording on/off switch.
//!
//! The collector consults [`RecordingGate::is_enabled`] before building any
//! capture event; the check is a single relaxed atomic load, so a disabled
//! gate costs nothing measurable per event (the zero-overhead-when-disabled
//! contract). Disables nest: recording resumes only once every `disable`
//! has been matched by an `enable`. [`RecordingGate::pause`] gives scoped
//! acquisition that re-enables on every exit path, including panics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Nestable atomic recording switch.
///
/// Lock-free and callable from any thread without external coordination.
/// The counter holds the number of outstanding `disable` calls; recording
/// is on while the counter is zero.
#[derive(Debug, Default)]
pub struct RecordingGate {
    pauses: AtomicU64,
}

impl RecordingGate {
    /// Create a gate with recording enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while no disable is outstanding.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.pauses.load(Ordering::Relaxed) == 0
    }

    /// Disable recording. Nestable: each call must be matched by one
    /// [`Self::enable`] before recording resumes.
    pub fn disable(&self) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
    }

    /// Re-enable recording after a [`Self::disable`].
    ///
    /// Calling with no disable outstanding is a no-op; the counter never
    /// underflows.
    pub fn enable(&self) {
        let _ = self
            .pauses
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                count.checked_sub(1)
            });
    }

    /// Disable recording for a scope. The returned guard re-enables on
    /// drop, on every exit path.
    pub fn pause(&self) -> PauseGuard<'_> {
        self.disable();
        PauseGuard { gate: self }
    }

    /// The number of outstanding disables.
    pub fn pause_depth(&self) -> u64 {
        self.pauses.load(Ordering::Relaxed)
    }
}

/// Scoped recording pause. Re-enables the gate when dropped.
#[must_use = "dropping the guard immediately re-enables recording"]
#[derive(Debug)]
pub struct PauseGuard<'a> {
    gate: &'a RecordingGate,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.gate.enable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_enabled() {
        let gate = RecordingGate::new();
        assert!(gate.is_enabled());
        assert_eq!(gate.pause_depth(), 0);
    }

    #[test]
    fn disable_enable_toggles() {
        let gate = RecordingGate::new();
        gate.disable();
        assert!(!gate.is_enabled());
        gate.enable();
        assert!(gate.is_enabled());
    }

    #[test]
    fn disables_nest() {
        let gate = RecordingGate::new();
        gate.disable();
        gate.disable();
        gate.enable();
        assert!(!gate.is_enabled());
        gate.enable();
        assert!(gate.is_enabled());
    }

    #[test]
    fn enable_without_disable_is_a_no_op() {
        let gate = RecordingGate::new();
        gate.enable();
        gate.enable();
        assert!(gate.is_enabled());
        // A following disable still takes effect.
        gate.disable();
        assert!(!gate.is_enabled());
    }

    #[test]
    fn pause_guard_re_enables_on_drop() {
        let gate = RecordingGate::new();
        {
            let _guard = gate.pause();
            assert!(!gate.is_enabled());
        }
        assert!(gate.is_enabled());
    }

    #[test]
    fn pause_guards_nest() {
        let gate = RecordingGate::new();
        let outer = gate.pause();
        {
            let _inner = gate.pause();
            assert_eq!(gate.pause_depth(), 2);
        }
        assert!(!gate.is_enabled());
        drop(outer);
        assert!(gate.is_enabled());
    }

    #[test]
    fn pause_guard_re_enables_on_panic() {
        let gate = RecordingGate::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = gate.pause();
            panic!("collector failure");
        }));
        assert!(result.is_err());
        assert!(gate.is_enabled());
    }

    #[test]
    fn concurrent_pauses_balance_out() {
        use std::sync::Arc;
        use std::thread;

        let gate = Arc::new(RecordingGate::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let _guard = gate.pause();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(gate.is_enabled());
        assert_eq!(gate.pause_depth(), 0);
    }
}
