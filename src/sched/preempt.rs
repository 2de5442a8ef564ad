/*
 * Preemption Gate
 *
 * A process-wide non-negative counter; preemption is enabled exactly
 * when the counter is zero. Generalizes the teacher's own
 * `PREEMPTION_DISABLED: AtomicBool` into a nesting counter, since gate
 * regions can nest (disable/enable pairs may be called from within an
 * already-disabled region).
 */

use core::sync::atomic::{AtomicU32, Ordering};

pub struct PreemptionGate(AtomicU32);

impl PreemptionGate {
    /// Initialized to 1: preemption is disabled during boot until
    /// `init_sched` finishes setting up the idle task and enables it.
    pub const fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    pub fn disable(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn enable(&self) {
        let prev = self.0.fetch_sub(1, Ordering::SeqCst);
        // A memory-safety-adjacent invariant: underflowing this counter
        // would make `is_enabled` report true while a caller still holds
        // an outstanding disabled region. Checked in release builds too.
        assert!(prev > 0, "enable_preemption called without a matching disable");
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::SeqCst) == 0
    }

    #[cfg(test)]
    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disabled() {
        let gate = PreemptionGate::new();
        assert!(!gate.is_enabled());
        assert_eq!(gate.count(), 1);
    }

    #[test]
    fn balanced_pairs_restore_enabled() {
        let gate = PreemptionGate::new();
        gate.enable();
        assert!(gate.is_enabled());

        gate.disable();
        gate.disable();
        assert!(!gate.is_enabled());
        gate.enable();
        assert!(!gate.is_enabled());
        gate.enable();
        assert!(gate.is_enabled());
    }

    #[test]
    fn nesting_is_counted_not_flagged() {
        let gate = PreemptionGate::new();
        gate.enable();
        gate.disable();
        gate.disable();
        gate.disable();
        assert_eq!(gate.count(), 3);
        gate.enable();
        gate.enable();
        assert!(!gate.is_enabled());
        gate.enable();
        assert!(gate.is_enabled());
    }
}
