//! Driver for the performance monitors of the K1B core.
//!
//! The K1B exposes four 32-bit counter slots (`pm0`..`pm3`) configured through a single shared
//! control register (`pmc`). This crate pairs the slots into two chained 64-bit monitors and
//! provides the lifecycle around them: setup, start, stop, and read.
//!
//! Register access goes through [`PerfAccess`], so the same controller runs against real hardware
//! or against the [`sim::SimulatedPmu`] model.

#[macro_use]
extern crate static_assertions;

use std::fmt;
use thiserror::Error;

pub mod event;
pub mod monitor;
pub mod platform;
pub mod pmc;
pub mod sim;

pub use event::{Event, EVENTS_NUM};
pub use monitor::{PerfMonitors, READ_FAILED};
pub use platform::PerfAccess;
pub use pmc::{Pmc, Slot, SlotCommand, SLOTS_NUM};

/// Number of logical (chained) performance monitors.
pub const MONITORS_NUM: u8 = 2;

const_assert_eq!(MONITORS_NUM * 2, SLOTS_NUM);

/// A logical 64-bit performance monitor. Can take values in the range `0..MONITORS_NUM`.
///
/// Each monitor is backed by two chained slots: `pmX = 2 * index` holds the low half of the count
/// and `pmY = pmX + 1` holds the high half.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Monitor(u8);

impl Monitor {
    /// Performance monitor made of `pm0` (low) and `pm1` (high).
    pub const PM_0_1: Self = Self(0);
    /// Performance monitor made of `pm2` (low) and `pm3` (high).
    pub const PM_2_3: Self = Self(1);

    /// Create a monitor from its index, returning `None` if the index is out of range.
    ///
    /// Negative or otherwise unrepresentable indices are rejected as well.
    pub fn new<U: TryInto<u8>>(index: U) -> Option<Self> {
        let index = index.try_into().ok()?;
        (index < MONITORS_NUM).then_some(Self(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Returns the `(low, high)` pair of slots backing this monitor.
    pub fn slots(self) -> (Slot, Slot) {
        let low = self.0 << 1;
        (Slot::from_u2(low), Slot::from_u2(low + 1))
    }

    /// Return an iterator over all monitors, in index order.
    pub fn iter_all() -> impl Iterator<Item = Self> {
        (0..MONITORS_NUM).map(Self)
    }
}

impl From<Monitor> for u8 {
    fn from(value: Monitor) -> Self {
        value.0
    }
}

impl From<Monitor> for usize {
    fn from(value: Monitor) -> Self {
        value.0 as usize
    }
}

impl TryFrom<u8> for Monitor {
    type Error = PerfError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(PerfError::InvalidMonitor)
    }
}

impl fmt::Display for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (low, high) = self.slots();
        write!(f, "{low}+{high}")
    }
}

/// Errors reported by the monitor lifecycle operations.
///
/// Both kinds are caller-input validation failures; no register has been touched when one is
/// returned.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum PerfError {
    /// The monitor index is outside `0..MONITORS_NUM`.
    #[error("invalid performance monitor")]
    InvalidMonitor,
    /// The event identifier is outside `0..EVENTS_NUM`.
    #[error("invalid performance event")]
    InvalidEvent,
}

impl PerfError {
    /// `EINVAL`, the only error number these operations produce.
    pub const EINVAL: i32 = 22;

    /// Returns the negative error number for C-style callers.
    pub fn errno(self) -> i32 {
        match self {
            PerfError::InvalidMonitor | PerfError::InvalidEvent => -Self::EINVAL,
        }
    }
}

pub type PerfResult<T = ()> = Result<T, PerfError>;
