//! Protection gate (C3): scoped unlock/lock of PM ranges for writes.
//!
//! Out of scope for this crate (spec §1/§6); every mutating PM access in
//! C4-C9 is wrapped in a [`ProtectionGate::unlocked`] call rather than
//! assuming PM is always writable, so an embedder backed by write-protected
//! NVMM (CR0.WP-style page protection) can plug in without the core
//! changing shape.

/// Temporarily makes `[offset, offset+len)` writable for the duration of
/// `f`, then restores whatever protection applied before.
///
/// Implementors must make nested/overlapping calls safe to the extent their
/// target platform allows; the core never assumes a particular nesting
/// depth, only that writes performed inside `f` succeed.
pub trait ProtectionGate {
    fn unlocked<R>(&self, offset: u64, len: usize, f: impl FnOnce() -> R) -> R;
}

/// A gate for targets where PM is always mapped writable (e.g. the
/// in-process [`crate::pmsim::PmSim`] used by tests, or a platform with no
/// write-protection concept). Performs no locking at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopGate;

impl ProtectionGate for NoopGate {
    fn unlocked<R>(&self, _offset: u64, _len: usize, f: impl FnOnce() -> R) -> R {
        f()
    }
}
