//! Timestamp type and `Clock` abstraction used for `atime`/`ctime`/`mtime`/`dtime`.
//!
//! The teacher stamps `DateTime` from a CMOS RTC chip (`fzboot::time::date`),
//! which has no meaning off real hardware. The data engine instead takes a
//! [`Clock`] implementation from its caller, so tests can supply a
//! deterministic [`FixedClock`].

use bytemuck::{Pod, Zeroable};

/// Seconds since the Unix epoch, as stored in an on-PM inode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct UnixTimestamp(pub u64);

impl UnixTimestamp {
    pub const ZERO: UnixTimestamp = UnixTimestamp(0);

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for UnixTimestamp {
    fn from(value: u64) -> Self {
        UnixTimestamp(value)
    }
}

/// Supplies the current wall-clock time to the engine.
///
/// Implemented by the embedding filesystem in production (typically backed
/// by an RTC or monotonic-plus-offset clock); implemented by [`FixedClock`]
/// in tests.
pub trait Clock {
    fn now(&self) -> UnixTimestamp;
}

/// Placeholder `Clock` for an embedder that has not yet wired up a real
/// time source. Always reports the epoch; production embedders are
/// expected to supply their own `Clock` backed by an RTC or a
/// monotonic-clock-plus-offset, the way the teacher reads `fzboot::time::date()`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UnixTimestamp {
        UnixTimestamp::ZERO
    }
}

/// A clock that always returns the same timestamp.
///
/// Useful in tests that need to assert exact `atime`/`ctime`/`mtime` values
/// without racing the real wall clock.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub UnixTimestamp);

impl Clock for FixedClock {
    fn now(&self) -> UnixTimestamp {
        self.0
    }
}

/// A clock whose `now()` advances by one on every call.
///
/// Useful for asserting ordering between timestamps (e.g. `ctime` of a
/// later operation must be strictly greater) without depending on real
/// time resolution.
pub struct TickingClock {
    next: core::cell::Cell<u64>,
}

impl TickingClock {
    #[must_use]
    pub fn starting_at(value: u64) -> Self {
        Self {
            next: core::cell::Cell::new(value),
        }
    }
}

impl Clock for TickingClock {
    fn now(&self) -> UnixTimestamp {
        let v = self.next.get();
        self.next.set(v + 1);
        UnixTimestamp(v)
    }
}
